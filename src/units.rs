use thiserror::Error;
use tracing::warn;

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * 1024;
pub const GIB: u64 = 1024 * 1024 * 1024;

const DECIMALS: usize = 3;

#[derive(Debug, Error)]
pub enum RoundingError {
    #[error("значение {0} не является конечным числом")]
    NonFinite(f64),
    #[error("не удалось разобрать округлённое значение '{text}': {source}")]
    Parse {
        text: String,
        source: std::num::ParseFloatError,
    },
}

/// Rounds to three decimals, half away from zero.
///
/// Never fails: if rounding is impossible the input is returned unchanged and
/// the problem is logged.
pub fn round3(value: f64) -> f64 {
    match try_round3(value) {
        Ok(rounded) => rounded,
        Err(err) => {
            warn!(error = %err, value, "ошибка округления, используется исходное значение");
            value
        }
    }
}

/// Rounds the shortest decimal representation of `value` rather than its
/// binary expansion, so `2.0005` becomes `2.001` even though the nearest f64
/// is slightly below it.
pub fn try_round3(value: f64) -> Result<f64, RoundingError> {
    if !value.is_finite() {
        return Err(RoundingError::NonFinite(value));
    }

    // f64 Display never switches to exponent notation.
    let text = value.abs().to_string();
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), ""));

    let mut digits: Vec<u8> = int_part.bytes().collect();
    digits.extend(
        frac_part
            .bytes()
            .chain(std::iter::repeat(b'0'))
            .take(DECIMALS),
    );
    if frac_part
        .as_bytes()
        .get(DECIMALS)
        .is_some_and(|digit| *digit >= b'5')
    {
        increment_digits(&mut digits);
    }

    let point = digits.len() - DECIMALS;
    let mut fixed = String::with_capacity(digits.len() + 1);
    for (idx, digit) in digits.iter().enumerate() {
        if idx == point {
            fixed.push('.');
        }
        fixed.push(char::from(*digit));
    }

    let magnitude = fixed
        .parse::<f64>()
        .map_err(|source| RoundingError::Parse {
            text: fixed.clone(),
            source,
        })?;

    if value.is_sign_negative() && magnitude != 0.0 {
        Ok(-magnitude)
    } else {
        Ok(magnitude)
    }
}

fn increment_digits(digits: &mut Vec<u8>) {
    for digit in digits.iter_mut().rev() {
        if *digit == b'9' {
            *digit = b'0';
        } else {
            *digit += 1;
            return;
        }
    }
    digits.insert(0, b'1');
}

pub fn convert(bytes: u64, divisor: u64) -> f64 {
    round3(bytes as f64 / divisor as f64)
}

pub fn average(percentages: &[f64]) -> f64 {
    if percentages.is_empty() {
        return 0.0;
    }
    let total: f64 = percentages.iter().sum();
    round3(total / percentages.len() as f64)
}
