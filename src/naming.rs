use std::fmt;
use std::str::FromStr;

use crate::error::NamingError;

/// Key naming conventions accepted in tunnel files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingStyle {
    Snake,
    Kebab,
    Camel,
    Pascal,
    Constant,
}

impl FromStr for NamingStyle {
    type Err = NamingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "snake" => Ok(Self::Snake),
            "kebab" => Ok(Self::Kebab),
            "camel" => Ok(Self::Camel),
            "pascal" => Ok(Self::Pascal),
            "constant" => Ok(Self::Constant),
            other => Err(NamingError::UnsupportedStyle(other.to_string())),
        }
    }
}

impl fmt::Display for NamingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::Snake => "snake",
            Self::Kebab => "kebab",
            Self::Camel => "camel",
            Self::Pascal => "pascal",
            Self::Constant => "constant",
        };
        f.write_str(tag)
    }
}

/// Split a key into lower-cased words.
///
/// Hyphens win over underscores; keys with neither are split in front of
/// ASCII uppercase letters, so `serverAliveInterval` and
/// `ServerAliveInterval` both give `server alive interval`. A run of
/// uppercase letters stays one word (`ADDR`, the `HTTP` in `HTTPProxy`).
///
/// Single-letter words are the exception to round-tripping: pascal `a_b`
/// is `AB`, which reads back as the one word `ab`.
fn words(key: &str) -> Vec<String> {
    let parts: Vec<String> = if key.contains('-') {
        key.split('-').map(str::to_string).collect()
    } else if key.contains('_') {
        key.split('_').map(str::to_string).collect()
    } else {
        let chars: Vec<char> = key.chars().collect();
        let mut parts = Vec::new();
        let mut current = String::new();
        for (i, &c) in chars.iter().enumerate() {
            if c.is_ascii_uppercase() && !current.is_empty() {
                let prev_upper = chars[i - 1].is_ascii_uppercase();
                let next_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
                if !prev_upper || next_lower {
                    parts.push(std::mem::take(&mut current));
                }
            }
            current.push(c);
        }
        if !current.is_empty() {
            parts.push(current);
        }
        parts
    };
    parts.into_iter().map(|w| w.to_lowercase()).collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Rewrite `key` in the given naming style.
pub fn convert(key: &str, style: NamingStyle) -> String {
    let words = words(key);
    match style {
        NamingStyle::Snake => words.join("_"),
        NamingStyle::Kebab => words.join("-"),
        NamingStyle::Camel => {
            let mut iter = words.iter();
            let mut out = iter.next().cloned().unwrap_or_default();
            for w in iter {
                out.push_str(&capitalize(w));
            }
            out
        }
        NamingStyle::Pascal => words.iter().map(|w| capitalize(w)).collect(),
        NamingStyle::Constant => words
            .iter()
            .map(|w| w.to_uppercase())
            .collect::<Vec<_>>()
            .join("_"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STYLES: [NamingStyle; 5] = [
        NamingStyle::Snake,
        NamingStyle::Kebab,
        NamingStyle::Camel,
        NamingStyle::Pascal,
        NamingStyle::Constant,
    ];

    #[test]
    fn kebab_to_snake() {
        assert_eq!(convert("no-remote-command", NamingStyle::Snake), "no_remote_command");
    }

    #[test]
    fn camel_to_snake() {
        assert_eq!(convert("serverAliveInterval", NamingStyle::Snake), "server_alive_interval");
    }

    #[test]
    fn pascal_to_snake() {
        assert_eq!(convert("LocalPorts", NamingStyle::Snake), "local_ports");
    }

    #[test]
    fn constant_to_snake() {
        assert_eq!(convert("REMOTE_ADDR", NamingStyle::Snake), "remote_addr");
    }

    #[test]
    fn snake_to_every_style() {
        let key = "server_alive_count_max";
        assert_eq!(convert(key, NamingStyle::Kebab), "server-alive-count-max");
        assert_eq!(convert(key, NamingStyle::Camel), "serverAliveCountMax");
        assert_eq!(convert(key, NamingStyle::Pascal), "ServerAliveCountMax");
        assert_eq!(convert(key, NamingStyle::Constant), "SERVER_ALIVE_COUNT_MAX");
    }

    #[test]
    fn single_word_untouched() {
        assert_eq!(convert("retry", NamingStyle::Snake), "retry");
        assert_eq!(convert("retry", NamingStyle::Camel), "retry");
        assert_eq!(convert("Retry", NamingStyle::Snake), "retry");
    }

    #[test]
    fn digits_stay_with_their_word() {
        assert_eq!(convert("ipv4_only", NamingStyle::Camel), "ipv4Only");
        assert_eq!(convert("ipv4Only", NamingStyle::Snake), "ipv4_only");
    }

    #[test]
    fn uppercase_runs_stay_together() {
        assert_eq!(convert("ADDR", NamingStyle::Snake), "addr");
        assert_eq!(convert("HTTPProxy", NamingStyle::Snake), "http_proxy");
        assert_eq!(convert("addr", NamingStyle::Constant), "ADDR");
    }

    #[test]
    fn empty_key() {
        for style in STYLES {
            assert_eq!(convert("", style), "");
        }
    }

    #[test]
    fn conversion_is_idempotent() {
        let keys = [
            "server_alive_interval",
            "server-alive-interval",
            "serverAliveInterval",
            "ServerAliveInterval",
            "SERVER_ALIVE_INTERVAL",
            "addr",
            "ipv6_only",
            "local_ports",
        ];
        for key in keys {
            for first in STYLES {
                let once = convert(key, first);
                for second in STYLES {
                    let x = convert(&once, second);
                    assert_eq!(convert(&x, second), x, "{key} via {first} then {second}");
                }
            }
        }
    }

    #[test]
    fn single_letter_words_merge_on_reconversion() {
        let pascal = convert("a_b", NamingStyle::Pascal);
        assert_eq!(pascal, "AB");
        assert_eq!(convert(&pascal, NamingStyle::Pascal), "Ab");

        let camel = convert("a_b_c", NamingStyle::Camel);
        assert_eq!(camel, "aBC");
        assert_eq!(convert(&camel, NamingStyle::Camel), "aBc");

        // Separated styles are unaffected.
        assert_eq!(convert("a_b", NamingStyle::Snake), "a_b");
        assert_eq!(convert("a_b", NamingStyle::Constant), "A_B");
    }

    #[test]
    fn style_from_str() {
        assert_eq!("camel".parse::<NamingStyle>(), Ok(NamingStyle::Camel));
        assert_eq!(
            "title".parse::<NamingStyle>(),
            Err(NamingError::UnsupportedStyle("title".to_string()))
        );
    }

    #[test]
    fn style_display_round_trips() {
        for style in STYLES {
            assert_eq!(style.to_string().parse::<NamingStyle>(), Ok(style));
        }
    }
}
