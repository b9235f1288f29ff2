/// Formats `amount` rounded to whole units with thousands separators and the
/// currency's symbol, e.g. `$1,299` or `¥49,500`. Unknown codes are written
/// as a prefix (`CHF 120`).
#[must_use]
pub fn format_money(amount: f64, currency: &str) -> String {
    let code = currency.trim().to_ascii_uppercase();
    let symbol = match code.as_str() {
        "USD" => "$".to_owned(),
        "JPY" => "¥".to_owned(),
        "EUR" => "€".to_owned(),
        "GBP" => "£".to_owned(),
        _ => format!("{code} "),
    };

    let rounded = amount.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    format!("{sign}{symbol}{}", group_thousands(rounded.abs()))
}

fn group_thousands(whole: f64) -> String {
    let digits = format!("{whole:.0}");
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_known_symbols_with_separators() {
        assert_eq!(format_money(1_299.4, "USD"), "$1,299");
        assert_eq!(format_money(49_500.0, "jpy"), "¥49,500");
        assert_eq!(format_money(1_234_567.0, "EUR"), "€1,234,567");
    }

    #[test]
    fn small_amounts_have_no_separator() {
        assert_eq!(format_money(0.0, "USD"), "$0");
        assert_eq!(format_money(89.0, "USD"), "$89");
        assert_eq!(format_money(999.5, "USD"), "$1,000");
    }

    #[test]
    fn unknown_currency_uses_code_prefix() {
        assert_eq!(format_money(120.0, "chf"), "CHF 120");
    }

    #[test]
    fn negative_amounts_keep_sign_before_symbol() {
        assert_eq!(format_money(-42.0, "USD"), "-$42");
    }
}
