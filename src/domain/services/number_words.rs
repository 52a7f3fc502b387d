//! Amount-in-words rendering for invoices, in Persian and English.

const PERSIAN_ONES: [&str; 10] = ["", "یک", "دو", "سه", "چهار", "پنج", "شش", "هفت", "هشت", "نه"];
const PERSIAN_TEENS: [&str; 10] = [
    "ده", "یازده", "دوازده", "سیزده", "چهارده", "پانزده", "شانزده", "هفده", "هجده", "نوزده",
];
const PERSIAN_TENS: [&str; 10] = ["", "", "بیست", "سی", "چهل", "پنجاه", "شصت", "هفتاد", "هشتاد", "نود"];
const PERSIAN_HUNDREDS: [&str; 10] = [
    "", "یکصد", "دویست", "سیصد", "چهارصد", "پانصد", "ششصد", "هفتصد", "هشتصد", "نهصد",
];
const PERSIAN_SCALES: [&str; 7] = ["", "هزار", "میلیون", "میلیارد", "تریلیون", "کوادریلیون", "کوینتیلیون"];

const ENGLISH_ONES: [&str; 20] = [
    "", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten", "eleven",
    "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen", "nineteen",
];
const ENGLISH_TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];
const ENGLISH_SCALES: [&str; 7] = ["", "thousand", "million", "billion", "trillion", "quadrillion", "quintillion"];

/// Split into base-1000 groups, least significant first.
fn groups(mut n: u64) -> Vec<u64> {
    let mut out = Vec::new();
    while n > 0 {
        out.push(n % 1000);
        n /= 1000;
    }
    out
}

fn persian_group(n: u64) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(3);
    let hundreds = (n / 100) as usize;
    let rest = (n % 100) as usize;

    if hundreds > 0 {
        parts.push(PERSIAN_HUNDREDS[hundreds]);
    }
    match rest {
        0 => {}
        1..=9 => parts.push(PERSIAN_ONES[rest]),
        10..=19 => parts.push(PERSIAN_TEENS[rest - 10]),
        _ => {
            parts.push(PERSIAN_TENS[rest / 10]);
            if rest % 10 > 0 {
                parts.push(PERSIAN_ONES[rest % 10]);
            }
        }
    }
    parts.join(" و ")
}

/// Persian words for an integer: `1250` → `یک هزار و دویست و پنجاه`.
pub fn to_persian_words(value: i64) -> String {
    if value == 0 {
        return "صفر".to_string();
    }

    let parts: Vec<String> = groups(value.unsigned_abs())
        .into_iter()
        .enumerate()
        .filter(|(_, g)| *g > 0)
        .map(|(scale, g)| {
            let words = persian_group(g);
            if scale == 0 {
                words
            } else {
                format!("{} {}", words, PERSIAN_SCALES[scale])
            }
        })
        .rev()
        .collect();

    let words = parts.join(" و ");
    if value < 0 {
        format!("منفی {}", words)
    } else {
        words
    }
}

fn english_group(n: u64) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(2);
    let hundreds = (n / 100) as usize;
    let rest = (n % 100) as usize;

    if hundreds > 0 {
        parts.push(format!("{} hundred", ENGLISH_ONES[hundreds]));
    }
    if rest > 0 {
        if rest < 20 {
            parts.push(ENGLISH_ONES[rest].to_string());
        } else if rest % 10 == 0 {
            parts.push(ENGLISH_TENS[rest / 10].to_string());
        } else {
            parts.push(format!("{}-{}", ENGLISH_TENS[rest / 10], ENGLISH_ONES[rest % 10]));
        }
    }
    parts.join(" ")
}

/// English words for an integer: `1250` → `one thousand two hundred fifty`.
pub fn to_english_words(value: i64) -> String {
    if value == 0 {
        return "zero".to_string();
    }

    let parts: Vec<String> = groups(value.unsigned_abs())
        .into_iter()
        .enumerate()
        .filter(|(_, g)| *g > 0)
        .map(|(scale, g)| {
            let words = english_group(g);
            if scale == 0 {
                words
            } else {
                format!("{} {}", words, ENGLISH_SCALES[scale])
            }
        })
        .rev()
        .collect();

    let words = parts.join(" ");
    if value < 0 {
        format!("minus {}", words)
    } else {
        words
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(0, "صفر")]
    #[test_case(7, "هفت")]
    #[test_case(13, "سیزده")]
    #[test_case(40, "چهل")]
    #[test_case(85, "هشتاد و پنج")]
    #[test_case(100, "یکصد")]
    #[test_case(512, "پانصد و دوازده")]
    #[test_case(1000, "یک هزار")]
    #[test_case(1250, "یک هزار و دویست و پنجاه")]
    #[test_case(2_000_005, "دو میلیون و پنج")]
    #[test_case(3_400_000_000, "سه میلیارد و چهارصد میلیون")]
    #[test_case(-21, "منفی بیست و یک")]
    fn test_persian_words(value: i64, expected: &str) {
        assert_eq!(to_persian_words(value), expected);
    }

    #[test_case(0, "zero")]
    #[test_case(15, "fifteen")]
    #[test_case(21, "twenty-one")]
    #[test_case(300, "three hundred")]
    #[test_case(1250, "one thousand two hundred fifty")]
    #[test_case(1_000_001, "one million one")]
    #[test_case(-40, "minus forty")]
    fn test_english_words(value: i64, expected: &str) {
        assert_eq!(to_english_words(value), expected);
    }

    #[test]
    fn test_extremes_do_not_panic() {
        assert!(to_persian_words(i64::MAX).contains("کوینتیلیون"));
        assert!(to_english_words(i64::MIN).starts_with("minus nine quintillion"));
    }
}
