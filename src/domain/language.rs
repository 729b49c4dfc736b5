//! Language Detection - 语言检测
//!
//! 纯同步的文本到语言标签启发式判断。按固定优先级测试 Unicode script
//! 区段；拉丁字母文本落入加权停用词 + 变音符匹配。检测永不失败：
//! 低于阈值的输入一律解析为调用方给定的默认标签。

/// 无法判定时的基线语言
pub const DEFAULT_LANGUAGE: &str = "en";

/// 拉丁语言胜出所需的最小停用词/标记命中数
const MIN_LATIN_HITS: usize = 2;

/// 检测 `text` 的语言，默认回退到 [`DEFAULT_LANGUAGE`]
pub fn detect(text: &str) -> &'static str {
    detect_or(text, DEFAULT_LANGUAGE)
}

/// 检测 `text` 的语言，默认回退到 `default`
///
/// 短输入照常接受；两个词的选区也要解析出可朗读的结果，而不是报错
pub fn detect_or<'a>(text: &str, default: &'a str) -> &'a str {
    if let Some(tag) = script_match(text) {
        return tag;
    }
    if let Some(tag) = latin_match(text) {
        return tag;
    }
    default
}

#[derive(Debug, Default)]
struct ScriptCounts {
    kana: usize,
    cjk: usize,
    hangul: usize,
    cyrillic: usize,
    arabic: usize,
    thai: usize,
    devanagari: usize,
}

fn count_scripts(text: &str) -> ScriptCounts {
    let mut counts = ScriptCounts::default();
    for c in text.chars() {
        match c as u32 {
            0x3040..=0x30FF => counts.kana += 1,
            0x4E00..=0x9FFF => counts.cjk += 1,
            0x1100..=0x11FF | 0xAC00..=0xD7AF => counts.hangul += 1,
            0x0400..=0x04FF => counts.cyrillic += 1,
            0x0600..=0x06FF => counts.arabic += 1,
            0x0E00..=0x0E7F => counts.thai += 1,
            0x0900..=0x097F => counts.devanagari += 1,
            _ => {}
        }
    }
    counts
}

/// Script 区段测试，固定优先级
///
/// CJK 汉字先查假名标记：汉字混假名判为日语，纯汉字判为中文
fn script_match(text: &str) -> Option<&'static str> {
    let counts = count_scripts(text);

    if counts.kana > 0 {
        return Some("ja");
    }
    if counts.cjk > 0 {
        return Some("zh");
    }
    if counts.hangul > 0 {
        return Some("ko");
    }
    if counts.cyrillic > 0 {
        return Some(cyrillic_variant(text));
    }
    if counts.arabic > 0 {
        return Some("ar");
    }
    if counts.thai > 0 {
        return Some("th");
    }
    if counts.devanagari > 0 {
        return Some("hi");
    }
    None
}

/// 乌克兰语有而俄语没有的字母
const UKRAINIAN_MARKERS: &[char] = &['і', 'ї', 'є', 'ґ', 'І', 'Ї', 'Є', 'Ґ'];

const RUSSIAN_STOP_WORDS: &[&str] = &[
    "это", "что", "как", "не", "и", "он", "она", "да", "нет", "привет",
];

const UKRAINIAN_STOP_WORDS: &[&str] = &[
    "це", "що", "як", "не", "і", "він", "вона", "так", "ні", "привіт",
];

/// 区分两种西里尔字母语言的二次词汇检查
fn cyrillic_variant(text: &str) -> &'static str {
    if text.chars().any(|c| UKRAINIAN_MARKERS.contains(&c)) {
        return "uk";
    }
    let tokens = tokenize(text);
    let uk_hits = count_stop_words(&tokens, UKRAINIAN_STOP_WORDS);
    let ru_hits = count_stop_words(&tokens, RUSSIAN_STOP_WORDS);
    if uk_hits > ru_hits {
        "uk"
    } else {
        "ru"
    }
}

struct LatinProfile {
    tag: &'static str,
    stop_words: &'static [&'static str],
    markers: &'static [char],
}

const LATIN_PROFILES: &[LatinProfile] = &[
    LatinProfile {
        tag: "es",
        stop_words: &[
            "el", "la", "los", "las", "de", "que", "y", "es", "en", "un", "una", "por", "con",
            "para", "pero", "como", "hola", "gracias", "está", "mundo",
        ],
        markers: &['ñ', '¿', '¡'],
    },
    LatinProfile {
        tag: "fr",
        stop_words: &[
            "le", "la", "les", "des", "du", "et", "est", "une", "je", "vous", "pas", "avec",
            "pour", "dans", "sur", "qui", "bonjour", "merci", "oui",
        ],
        markers: &['ç', 'è', 'ê', 'œ', 'à'],
    },
    LatinProfile {
        tag: "de",
        stop_words: &[
            "der", "die", "das", "und", "ist", "nicht", "ein", "eine", "ich", "sie", "mit",
            "für", "auf", "zu", "hallo", "danke",
        ],
        markers: &['ß', 'ä', 'ö', 'ü'],
    },
    LatinProfile {
        tag: "it",
        stop_words: &[
            "il", "la", "le", "di", "che", "e", "un", "una", "per", "non", "sono", "con",
            "ciao", "questo", "grazie",
        ],
        markers: &['ò', 'ù'],
    },
    LatinProfile {
        tag: "pt",
        stop_words: &[
            "o", "os", "as", "de", "que", "e", "um", "uma", "não", "com", "para", "por",
            "olá", "você", "obrigado",
        ],
        markers: &['ã', 'õ'],
    },
    LatinProfile {
        tag: "nl",
        stop_words: &[
            "de", "het", "een", "en", "van", "ik", "je", "niet", "met", "voor", "dit",
            "hallo", "dank",
        ],
        markers: &[],
    },
];

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

fn count_stop_words(tokens: &[String], stop_words: &[&str]) -> usize {
    tokens
        .iter()
        .filter(|t| stop_words.contains(&t.as_str()))
        .count()
}

/// 拉丁语言的加权停用词/变音符匹配
///
/// 胜出者需要至少 [`MIN_LATIN_HITS`] 次命中且严格多于所有竞争者；
/// 平局判为无结果
fn latin_match(text: &str) -> Option<&'static str> {
    let lowered = text.to_lowercase();
    let tokens = tokenize(text);

    let mut best: Option<(&'static str, usize)> = None;
    let mut contested = false;

    for profile in LATIN_PROFILES {
        let word_hits = count_stop_words(&tokens, profile.stop_words);
        let marker_hits = lowered
            .chars()
            .filter(|c| profile.markers.contains(c))
            .count();
        let score = word_hits + marker_hits;

        match best {
            Some((_, top)) if score > top => {
                best = Some((profile.tag, score));
                contested = false;
            }
            Some((_, top)) if score == top => contested = true,
            None => best = Some((profile.tag, score)),
            _ => {}
        }
    }

    match best {
        Some((tag, score)) if score >= MIN_LATIN_HITS && !contested => Some(tag),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_french() {
        assert_eq!(detect("Bonjour le monde"), "fr");
    }

    #[test]
    fn test_detect_spanish() {
        assert_eq!(detect("Hola, ¿cómo está el mundo?"), "es");
    }

    #[test]
    fn test_detect_german() {
        assert_eq!(detect("Der Hund ist nicht hier"), "de");
    }

    #[test]
    fn test_detect_chinese_without_kana() {
        assert_eq!(detect("你好世界"), "zh");
    }

    #[test]
    fn test_detect_japanese_by_kana_marker() {
        // 汉字混假名判为日语，不是中文
        assert_eq!(detect("こんにちは世界"), "ja");
    }

    #[test]
    fn test_detect_korean() {
        assert_eq!(detect("안녕하세요"), "ko");
    }

    #[test]
    fn test_detect_russian() {
        assert_eq!(detect("Привет, как дела"), "ru");
    }

    #[test]
    fn test_detect_ukrainian_by_marker_letters() {
        assert_eq!(detect("Привіт, як справи"), "uk");
    }

    #[test]
    fn test_detect_arabic() {
        assert_eq!(detect("مرحبا بالعالم"), "ar");
    }

    #[test]
    fn test_detect_thai() {
        assert_eq!(detect("สวัสดีชาวโลก"), "th");
    }

    #[test]
    fn test_short_input_falls_back_without_error() {
        // 太短达不到阈值，但必须正常解析
        assert_eq!(detect("Hi"), DEFAULT_LANGUAGE);
    }

    #[test]
    fn test_empty_input_falls_back() {
        assert_eq!(detect(""), DEFAULT_LANGUAGE);
    }

    #[test]
    fn test_custom_default() {
        assert_eq!(detect_or("Hi", "sv"), "sv");
    }

    #[test]
    fn test_ambiguous_latin_text_falls_back() {
        // "la" 同时给多个语言计分；平局不得胜出
        assert_eq!(detect("la la"), DEFAULT_LANGUAGE);
    }
}
