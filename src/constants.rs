/// 引擎常量配置
///
/// 该文件定义了词典加载、文本过滤和DOM扫描相关的常量，方便统一管理和维护

/// 词典来源配置
pub mod dictionary_config {
    /// 默认远程词典地址（按顺序尝试，新版路径在前）
    pub const DEFAULT_DICT_URLS: &[&str] = &[
        "https://raw.githubusercontent.com/kailous/weavy-cn/main/lang/weavy-zh--.json",
        "https://raw.githubusercontent.com/kailous/weavy-cn/main/lang/weavy-zh.json",
    ];

    /// 数字占位符
    pub const PLACEHOLDER_TOKEN: &str = "%d";

    /// 数字捕获表达式：数字、可选千位分隔符、可选小数部分
    pub const NUM_CAPTURE: &str = r"([0-9][0-9,]*(?:\.[0-9]+)?)";

    /// 子串替换的最小键长度（字符数）
    pub const MIN_SUBSTRING_LEN: usize = 6;

    /// 请求超时时间（秒）
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 15;

    /// 默认最大重试次数
    pub const DEFAULT_MAX_RETRIES: usize = 2;

    /// 重试延迟基数（毫秒）
    pub const RETRY_DELAY_BASE_MS: u64 = 500;
}

/// 文本过滤配置
pub mod classifier_config {
    /// 默认最小长度
    pub const DEFAULT_MIN_LEN: usize = 2;

    /// 默认最大长度
    pub const DEFAULT_MAX_LEN: usize = 800;

    /// 极端超长文本上限，先于最大长度检查
    pub const EMERGENCY_MAX_LEN: usize = 2000;

    /// 结构/代码标记字符
    pub const MARKUP_CHARS: &[char] = &['{', '}', '[', ']', '<', '>', '`', '$'];
}

/// DOM扫描配置
pub mod scan_config {
    /// 默认参与翻译/提取的属性
    pub const DEFAULT_ATTRS: &[&str] = &["aria-label", "title", "placeholder", "value"];

    /// 排除的可编辑/代码元素
    pub const EXCLUDED_TAGS: &[&str] = &["textarea", "input", "pre", "code"];

    /// 不渲染文本的元素
    pub const NON_RENDERED_TAGS: &[&str] = &["script", "style", "noscript", "template"];

    /// 被排除元素上仍可处理的界面属性
    pub const CHROME_ATTRS: &[&str] = &["aria-label", "title", "placeholder"];

    /// `value` 作为显示文本的 input 类型
    pub const LABEL_INPUT_TYPES: &[&str] = &["button", "submit", "reset"];

    /// 默认最大访问节点数
    pub const DEFAULT_MAX_NODES: usize = 250_000;

    /// 默认 shadow/iframe 递归深度
    pub const DEFAULT_MAX_DEPTH: usize = 12;
}

/// 提取目录配置
pub mod catalog_config {
    /// 每个条目保留的位置样本数
    pub const SAMPLE_LIMIT: usize = 3;

    /// 位置描述向上追溯的层数
    pub const DESCRIPTOR_DEPTH: usize = 4;

    /// 每层保留的 class 数量
    pub const DESCRIPTOR_CLASSES: usize = 2;
}

/// 验证URL是否为HTTP(S)地址
pub fn is_valid_dict_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
