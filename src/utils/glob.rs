//! Redis 스타일 glob 패턴 매칭
//!
//! `SCAN ... MATCH` 와 동일한 규칙을 인메모리 백엔드에서 재현하기 위한 매처입니다.
//!
//! | 패턴 | 의미 |
//! |------|------|
//! | `*` | 0개 이상의 임의 문자 |
//! | `?` | 정확히 1개 문자 |
//! | `[abc]`, `[a-z]`, `[^a]` | 문자 클래스 |
//! | `\x` | 문자 `x` 그대로 |

/// 패턴에 와일드카드가 포함되어 있는지 확인합니다.
pub fn has_wildcard(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// `text`가 `pattern`과 일치하는지 확인합니다.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0usize, 0usize);
    // 마지막 '*'의 위치와 그 '*'가 흡수하기 시작한 텍스트 위치
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
            continue;
        }

        if pi < p.len() {
            if let Some(next) = step(&p, pi, t[ti]) {
                pi = next;
                ti += 1;
                continue;
            }
        }

        match star {
            Some((sp, st)) => {
                pi = sp + 1;
                ti = st + 1;
                star = Some((sp, st + 1));
            }
            None => return false,
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }

    pi == p.len()
}

/// `p[pi]`의 단일 패턴 요소가 `c`와 일치하면 다음 패턴 위치를 반환합니다.
fn step(p: &[char], pi: usize, c: char) -> Option<usize> {
    match p[pi] {
        '?' => Some(pi + 1),
        '\\' if pi + 1 < p.len() => (p[pi + 1] == c).then_some(pi + 2),
        '[' => match_class(p, pi, c),
        literal => (literal == c).then_some(pi + 1),
    }
}

fn match_class(p: &[char], pi: usize, c: char) -> Option<usize> {
    let mut j = pi + 1;
    let negate = j < p.len() && p[j] == '^';
    if negate {
        j += 1;
    }

    let mut matched = false;
    loop {
        if j >= p.len() {
            // 닫히지 않은 '['는 문자 그대로 취급
            return (c == '[').then_some(pi + 1);
        }

        match p[j] {
            ']' => break,
            '\\' if j + 1 < p.len() => {
                if p[j + 1] == c {
                    matched = true;
                }
                j += 2;
            }
            start if j + 2 < p.len() && p[j + 1] == '-' && p[j + 2] != ']' => {
                let end = p[j + 2];
                let (lo, hi) = if start <= end { (start, end) } else { (end, start) };
                if lo <= c && c <= hi {
                    matched = true;
                }
                j += 3;
            }
            single => {
                if single == c {
                    matched = true;
                }
                j += 1;
            }
        }
    }

    (matched != negate).then_some(j + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_matches_any_suffix() {
        assert!(glob_match("friends:user:7*", "friends:user:7:list"));
        assert!(glob_match("friends:user:7*", "friends:user:7:pending"));
        assert!(glob_match("friends:user:7*", "friends:user:7"));
        assert!(!glob_match("friends:user:7*", "friends:user:8:list"));
    }

    #[test]
    fn test_star_in_the_middle() {
        assert!(glob_match("user:*:profile", "user:42:profile"));
        assert!(glob_match("user:*:profile", "user::profile"));
        assert!(!glob_match("user:*:profile", "user:42:settings"));
        assert!(glob_match("*post_1*", "comment:list:post_1:page_2"));
    }

    #[test]
    fn test_question_mark_and_classes() {
        assert!(glob_match("user:?", "user:1"));
        assert!(!glob_match("user:?", "user:12"));
        assert!(glob_match("user:[123]", "user:2"));
        assert!(!glob_match("user:[123]", "user:4"));
        assert!(glob_match("user:[a-c]x", "user:bx"));
        assert!(glob_match("user:[^a]", "user:b"));
        assert!(!glob_match("user:[^a]", "user:a"));
    }

    #[test]
    fn test_escape_and_literal_bracket() {
        assert!(glob_match("key\\*", "key*"));
        assert!(!glob_match("key\\*", "keyx"));
        assert!(glob_match("key[", "key["));
    }

    #[test]
    fn test_has_wildcard() {
        assert!(has_wildcard("post:*"));
        assert!(has_wildcard("user:?"));
        assert!(!has_wildcard("post:42"));
    }
}
