//! Chinese display names for ISO 639-1 language codes.

/// Shown when a language is absent or not in the table.
pub const UNKNOWN_DISPLAY: &str = "未知";

const LANGUAGES: &[(&str, &str)] = &[
    // East Asia
    ("zh", "中文"),
    ("zh-CN", "简体中文"),
    ("zh-TW", "繁体中文"),
    ("ja", "日文"),
    ("ko", "韩文"),
    // Europe
    ("en", "英文"),
    ("en-US", "美式英文"),
    ("en-GB", "英式英文"),
    ("es", "西班牙文"),
    ("fr", "法文"),
    ("de", "德文"),
    ("it", "意大利文"),
    ("pt", "葡萄牙文"),
    ("ru", "俄文"),
    ("nl", "荷兰文"),
    ("pl", "波兰文"),
    ("tr", "土耳其文"),
    // Southeast Asia
    ("vi", "越南文"),
    ("th", "泰文"),
    ("id", "印尼文"),
    ("ms", "马来文"),
    ("fil", "菲律宾文"),
    // South Asia
    ("hi", "印地文"),
    ("bn", "孟加拉文"),
    ("ta", "泰米尔文"),
    // Middle East
    ("ar", "阿拉伯文"),
    ("fa", "波斯文"),
    ("he", "希伯来文"),
    // Africa
    ("sw", "斯瓦希里文"),
    ("am", "阿姆哈拉文"),
    ("ha", "豪萨文"),
];

fn lookup(code: &str) -> Option<&'static str> {
    LANGUAGES.iter().find(|(c, _)| *c == code).map(|(_, name)| *name)
}

/// Exact code first, then the primary subtag (`pt-BR` → `pt`).
#[must_use]
pub fn display_name(code: Option<&str>) -> &'static str {
    let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) else {
        return UNKNOWN_DISPLAY;
    };
    lookup(code)
        .or_else(|| code.split('-').next().and_then(lookup))
        .unwrap_or(UNKNOWN_DISPLAY)
}
