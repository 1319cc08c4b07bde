//! IEEE 11073 FLOAT and SFLOAT conversion
//!
//! Both types are base-10 floating point: `value = mantissa * 10^exponent`.
//! FLOAT packs a signed 8-bit exponent and a signed 24-bit mantissa into 32
//! bits; SFLOAT packs a signed 4-bit exponent and a signed 12-bit mantissa
//! into 16 bits. Five mantissa values at the top of the range are reserved
//! for +INF, NaN, NRes, a reserved value and -INF.

/// Reserved value decoding order, starting at the +INF sentinel
const RESERVED_VALUES: [f64; 5] = [
    f64::INFINITY,
    f64::NAN,
    f64::NAN,
    f64::NAN,
    f64::NEG_INFINITY,
];

/// FLOAT sentinels
pub const FLOAT_POSITIVE_INFINITY: u32 = 0x007F_FFFE;
pub const FLOAT_NAN: u32 = 0x007F_FFFF;
pub const FLOAT_NRES: u32 = 0x0080_0000;
pub const FLOAT_RESERVED: u32 = 0x0080_0001;
pub const FLOAT_NEGATIVE_INFINITY: u32 = 0x0080_0002;

/// SFLOAT sentinels
pub const SFLOAT_POSITIVE_INFINITY: u16 = 0x07FE;
pub const SFLOAT_NAN: u16 = 0x07FF;
pub const SFLOAT_NRES: u16 = 0x0800;
pub const SFLOAT_RESERVED: u16 = 0x0801;
pub const SFLOAT_NEGATIVE_INFINITY: u16 = 0x0802;

/// Encoding bounds of one of the two float formats
struct Format {
    mantissa_max: f64,
    exponent_min: i32,
    exponent_max: i32,
    max: f64,
    epsilon: f64,
    precision: f64,
}

const FLOAT_FORMAT: Format = Format {
    mantissa_max: 0x7F_FFFD as f64,
    exponent_min: -128,
    exponent_max: 127,
    max: 8.388_604_999_999_999e133,
    epsilon: 1e-128,
    precision: 10_000_000.0,
};

const SFLOAT_FORMAT: Format = Format {
    mantissa_max: 0x7FD as f64,
    exponent_min: -8,
    exponent_max: 7,
    max: 20_450_000_000.0,
    epsilon: 1e-8,
    precision: 10_000.0,
};

/// Outcome of scaling a value into mantissa/exponent form
enum Scaled {
    Nan,
    PositiveInfinity,
    NegativeInfinity,
    Zero,
    Finite { mantissa: i32, exponent: i32 },
}

fn scale(value: f64, format: &Format) -> Scaled {
    if value.is_nan() {
        return Scaled::Nan;
    }
    if value > format.max {
        return Scaled::PositiveInfinity;
    }
    if value < -format.max {
        return Scaled::NegativeInfinity;
    }
    if value.abs() <= format.epsilon {
        return Scaled::Zero;
    }

    let sign = if value > 0.0 { 1.0 } else { -1.0 };
    let mut mantissa = value.abs();
    let mut exponent: i32 = 0;

    while mantissa > format.mantissa_max {
        mantissa /= 10.0;
        exponent += 1;
        if exponent > format.exponent_max {
            return if sign > 0.0 {
                Scaled::PositiveInfinity
            } else {
                Scaled::NegativeInfinity
            };
        }
    }

    while mantissa < 1.0 {
        mantissa *= 10.0;
        exponent -= 1;
        if exponent < format.exponent_min {
            return Scaled::Zero;
        }
    }

    // Keep adding decimal digits while the value still loses precision
    let precision_loss = |m: f64| {
        ((m * format.precision).round() - m.round() * format.precision).abs()
    };
    while precision_loss(mantissa) > 0.5
        && exponent > format.exponent_min
        && mantissa * 10.0 <= format.mantissa_max
    {
        mantissa *= 10.0;
        exponent -= 1;
    }

    Scaled::Finite {
        mantissa: (sign * mantissa).round() as i32,
        exponent,
    }
}

fn compose(mantissa: i32, exponent: i32) -> f64 {
    let mantissa = f64::from(mantissa);
    if exponent >= 0 {
        mantissa * 10f64.powi(exponent)
    } else {
        mantissa / 10f64.powi(-exponent)
    }
}

/// Convert a native value to its 32-bit FLOAT representation
#[must_use]
pub fn encode_float(value: f64) -> u32 {
    match scale(value, &FLOAT_FORMAT) {
        Scaled::Nan => FLOAT_NAN,
        Scaled::PositiveInfinity => FLOAT_POSITIVE_INFINITY,
        Scaled::NegativeInfinity => FLOAT_NEGATIVE_INFINITY,
        Scaled::Zero => 0,
        Scaled::Finite { mantissa, exponent } => {
            ((exponent as u32 & 0xFF) << 24) | (mantissa as u32 & 0x00FF_FFFF)
        }
    }
}

/// Convert a 32-bit FLOAT to a native value
#[must_use]
pub fn decode_float(raw: u32) -> f64 {
    let mantissa = raw & 0x00FF_FFFF;
    if (FLOAT_POSITIVE_INFINITY..=FLOAT_NEGATIVE_INFINITY).contains(&mantissa) {
        return RESERVED_VALUES[(mantissa - FLOAT_POSITIVE_INFINITY) as usize];
    }

    let mantissa = if mantissa >= 0x0080_0000 {
        mantissa as i32 - 0x0100_0000
    } else {
        mantissa as i32
    };
    let exponent = i32::from((raw >> 24) as u8 as i8);
    compose(mantissa, exponent)
}

/// Convert a native value to its 16-bit SFLOAT representation
#[must_use]
pub fn encode_sfloat(value: f64) -> u16 {
    match scale(value, &SFLOAT_FORMAT) {
        Scaled::Nan => SFLOAT_NAN,
        Scaled::PositiveInfinity => SFLOAT_POSITIVE_INFINITY,
        Scaled::NegativeInfinity => SFLOAT_NEGATIVE_INFINITY,
        Scaled::Zero => 0,
        Scaled::Finite { mantissa, exponent } => {
            (((exponent & 0x0F) as u16) << 12) | (mantissa & 0x0FFF) as u16
        }
    }
}

/// Convert a 16-bit SFLOAT to a native value
#[must_use]
pub fn decode_sfloat(raw: u16) -> f64 {
    let mantissa = raw & 0x0FFF;
    if (SFLOAT_POSITIVE_INFINITY..=SFLOAT_NEGATIVE_INFINITY).contains(&mantissa) {
        return RESERVED_VALUES[(mantissa - SFLOAT_POSITIVE_INFINITY) as usize];
    }

    let mantissa = if mantissa >= 0x0800 {
        i32::from(mantissa) - 0x1000
    } else {
        i32::from(mantissa)
    };
    let exponent = i32::from(raw >> 12);
    let exponent = if exponent >= 0x8 { exponent - 0x10 } else { exponent };
    compose(mantissa, exponent)
}
