//! Output filename templates.
//!
//! Two independent steps:
//!
//! 1. [`translate_legacy`] rewrites printf-style tokens (`%04d`, `%6.2f`,
//!    `%ts`, `%t`, `%cm`, `%%`) into brace syntax.
//! 2. [`render`] substitutes `{timestep}`, `{time}` and `{camera}`, each
//!    with an optional `:[flags][width][.precision][d|f|s]` format spec.
//!    Flags are the printf ones: `-` left-aligns, `+` and space set the
//!    sign of non-negative numbers, `#` keeps the decimal point and `0`
//!    pads with zeros. Width and precision are capped at [`MAX_WIDTH`].
//!
//! A template already in brace syntax passes through step 1 unchanged, so
//! callers may always run both.

use std::fmt::Write as _;

use thiserror::Error;

/// Values substituted by [`render`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TemplateArgs<'a> {
    /// Value of `{timestep}`.
    pub timestep: i64,
    /// Value of `{time}`.
    pub time: f64,
    /// Value of `{camera}`.
    pub camera: &'a str,
}

impl TemplateArgs<'static> {
    /// Arguments with an empty camera name.
    pub fn new(timestep: i64, time: f64) -> Self {
        Self {
            timestep,
            time,
            camera: "",
        }
    }
}

impl<'a> TemplateArgs<'a> {
    /// Replace the camera name.
    pub fn with_camera(self, camera: &'a str) -> TemplateArgs<'a> {
        TemplateArgs { camera, ..self }
    }
}

/// Errors from [`render`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// A `{name}` other than `timestep`, `time`, `camera`.
    #[error("unknown template field '{name}'")]
    UnknownName {
        /// The field name as written.
        name: String,
    },
    /// A format spec that does not parse, or does not suit the field.
    #[error("invalid format spec '{spec}' for '{name}': {reason}")]
    BadSpec {
        /// Field the spec was attached to.
        name: String,
        /// The spec as written.
        spec: String,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// `d` applied to the floating-point `time` field.
    #[error("integer format 'd' applied to float field '{name}'")]
    DecimalOnFloat {
        /// Field the spec was attached to.
        name: String,
    },
    /// `{` without a closing `}`.
    #[error("unterminated '{{' at byte {offset}")]
    Unterminated {
        /// Byte offset of the opening brace.
        offset: usize,
    },
    /// A lone `}` outside a field.
    #[error("unmatched '}}' at byte {offset}")]
    UnmatchedBrace {
        /// Byte offset of the brace.
        offset: usize,
    },
}

// ── Legacy translation ─────────────────────────────────────────────

/// Rewrite printf-style tokens into brace syntax.
///
/// | legacy | brace |
/// |--------|-------|
/// | `%cm` | `{camera}` |
/// | `%ts` | `{timestep}` |
/// | `%t` | `{time}` |
/// | `%<flags><width>d` | `{timestep:<flags><width>d}` |
/// | `%<flags><width>.<prec>f` (also `e`, `g`) | `{time:<flags><width>.<prec>f}` |
/// | `%%` | `%` |
///
/// Unrecognised `%` sequences are kept verbatim.
pub fn translate_legacy(pattern: &str) -> String {
    if !pattern.contains('%') {
        return pattern.to_string();
    }
    let mut out = String::with_capacity(pattern.len() + 16);
    let mut rest = pattern;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let token = &rest[pos + 1..];
        let (replacement, consumed) = legacy_token(token);
        match replacement {
            Some(r) => out.push_str(&r),
            None => out.push('%'),
        }
        rest = &token[consumed..];
    }
    out.push_str(rest);
    out
}

/// Translate the token after a `%`. Returns the replacement (if any) and
/// how many bytes of `token` it used.
fn legacy_token(token: &str) -> (Option<String>, usize) {
    if token.starts_with('%') {
        return (Some("%".to_string()), 1);
    }
    if token.starts_with("cm") {
        return (Some("{camera}".to_string()), 2);
    }
    if token.starts_with("ts") {
        return (Some("{timestep}".to_string()), 2);
    }

    let bytes = token.as_bytes();
    let mut i = 0;
    while i < bytes.len() && matches!(bytes[i], b'-' | b'+' | b' ' | b'#' | b'0') {
        i += 1;
    }
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    let spec = &token[..i];
    match bytes.get(i) {
        Some(b'd' | b'i' | b'u') => (Some(format!("{{timestep:{spec}d}}")), i + 1),
        Some(b'f' | b'F' | b'e' | b'E' | b'g' | b'G') => {
            (Some(format!("{{time:{spec}f}}")), i + 1)
        }
        _ if token.starts_with('t') => (Some("{time}".to_string()), 1),
        _ => (None, 0),
    }
}

// ── Rendering ──────────────────────────────────────────────────────

/// Largest width or precision a format spec may ask for.
pub const MAX_WIDTH: usize = 1024;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Spec {
    left: bool,
    sign: Option<char>,
    alternate: bool,
    zero: bool,
    width: usize,
    precision: Option<usize>,
    ty: Option<char>,
}

fn parse_spec(name: &str, spec: &str) -> Result<Spec, TemplateError> {
    let bad = |reason| TemplateError::BadSpec {
        name: name.to_string(),
        spec: spec.to_string(),
        reason,
    };
    let bounded = |digits: &str| digits.parse::<usize>().ok().filter(|&n| n <= MAX_WIDTH);
    let mut out = Spec::default();
    let flags = spec
        .bytes()
        .take_while(|b| matches!(b, b'-' | b'+' | b' ' | b'#' | b'0'))
        .count();
    for flag in spec[..flags].chars() {
        match flag {
            '-' => out.left = true,
            '+' => out.sign = Some('+'),
            ' ' => out.sign = out.sign.or(Some(' ')),
            '#' => out.alternate = true,
            _ => out.zero = true,
        }
    }
    let mut rest = &spec[flags..];
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0 {
        out.width = bounded(&rest[..digits]).ok_or_else(|| bad("width out of range"))?;
        rest = &rest[digits..];
    }
    if let Some(r) = rest.strip_prefix('.') {
        let digits = r.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return Err(bad("precision needs digits after '.'"));
        }
        out.precision = Some(bounded(&r[..digits]).ok_or_else(|| bad("precision out of range"))?);
        rest = &r[digits..];
    }
    let mut chars = rest.chars();
    match (chars.next(), chars.next()) {
        (None, _) => {}
        (Some(c @ ('d' | 'f' | 's')), None) => out.ty = Some(c),
        (Some(_), None) => return Err(bad("type must be one of d, f, s")),
        (Some(_), Some(_)) => return Err(bad("trailing characters")),
    }
    Ok(out)
}

/// Render a brace-syntax template.
///
/// Numbers are right-aligned to the width unless `-` is given; a `0` flag
/// pads with zeros after the sign. An integer precision is a minimum digit
/// count. Strings are left-aligned and truncated to the precision. `{time}` without a spec uses the shortest representation
/// that round-trips, always with a fractional part (`3.0`, `0.25`).
pub fn render(template: &str, args: &TemplateArgs<'_>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len() + 16);
    let mut iter = template.char_indices().peekable();
    while let Some((offset, c)) = iter.next() {
        match c {
            '{' if matches!(iter.peek(), Some((_, '{'))) => {
                iter.next();
                out.push('{');
            }
            '}' if matches!(iter.peek(), Some((_, '}'))) => {
                iter.next();
                out.push('}');
            }
            '}' => return Err(TemplateError::UnmatchedBrace { offset }),
            '{' => {
                let body_start = offset + 1;
                let close = template[body_start..]
                    .find('}')
                    .ok_or(TemplateError::Unterminated { offset })?;
                let body = &template[body_start..body_start + close];
                render_field(&mut out, body, args)?;
                // Skip the field body and its closing brace.
                while let Some((i, _)) = iter.peek() {
                    if *i > body_start + close {
                        break;
                    }
                    iter.next();
                }
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

fn render_field(out: &mut String, body: &str, args: &TemplateArgs<'_>) -> Result<(), TemplateError> {
    let (name, spec_text) = match body.split_once(':') {
        Some((name, spec)) => (name, spec),
        None => (body, ""),
    };
    let spec = parse_spec(name, spec_text)?;
    let bad = |reason| TemplateError::BadSpec {
        name: name.to_string(),
        spec: spec_text.to_string(),
        reason,
    };
    match name {
        "timestep" => match spec.ty {
            None | Some('d') => {
                let text = integer_text(args.timestep, spec);
                // A precision on an integer already fixes its digit count.
                let zero = spec.zero && spec.precision.is_none();
                pad_number(out, &text, spec, zero);
            }
            Some('f') => {
                let text = float_text(args.timestep as f64, Some(spec.precision.unwrap_or(6)), spec);
                pad_number(out, &text, spec, spec.zero);
            }
            _ => return Err(bad("strings format does not apply to numbers")),
        },
        "time" => {
            let precision = match spec.ty {
                Some('d') => {
                    return Err(TemplateError::DecimalOnFloat {
                        name: name.to_string(),
                    })
                }
                Some('s') => return Err(bad("strings format does not apply to numbers")),
                Some('f') => Some(spec.precision.unwrap_or(6)),
                _ => spec.precision,
            };
            let text = float_text(args.time, precision, spec);
            pad_number(out, &text, spec, spec.zero);
        }
        "camera" => {
            if spec.zero || spec.sign.is_some() || spec.alternate || matches!(spec.ty, Some('d' | 'f')) {
                return Err(bad("numeric format does not apply to strings"));
            }
            let text: String = match spec.precision {
                Some(p) => args.camera.chars().take(p).collect(),
                None => args.camera.to_string(),
            };
            // Writing into a String cannot fail.
            let _ = write!(out, "{text:<width$}", width = spec.width);
        }
        _ => {
            return Err(TemplateError::UnknownName {
                name: name.to_string(),
            })
        }
    }
    Ok(())
}

/// Integer digits with printf semantics: the precision is a minimum digit
/// count, and a zero precision prints nothing for zero.
fn integer_text(value: i64, spec: Spec) -> String {
    let magnitude = value.unsigned_abs();
    let digits = match spec.precision {
        Some(0) if magnitude == 0 => String::new(),
        Some(p) => format!("{magnitude:0p$}"),
        None => magnitude.to_string(),
    };
    with_sign(value < 0, digits, spec)
}

/// Fixed notation at `precision`, or the shortest round-trip form.
fn float_text(value: f64, precision: Option<usize>, spec: Spec) -> String {
    let mut text = match precision {
        Some(p) => format!("{:.*}", p, value.abs()),
        None => format!("{:?}", value.abs()),
    };
    if spec.alternate && value.is_finite() && !text.contains('.') {
        text.push('.');
    }
    with_sign(value.is_sign_negative() && !value.is_nan(), text, spec)
}

fn with_sign(negative: bool, digits: String, spec: Spec) -> String {
    match (negative, spec.sign) {
        (true, _) => format!("-{digits}"),
        (false, Some(sign)) => format!("{sign}{digits}"),
        (false, None) => digits,
    }
}

fn pad_number(out: &mut String, text: &str, spec: Spec, zero: bool) {
    let len = text.chars().count();
    if len >= spec.width {
        out.push_str(text);
        return;
    }
    let fill = spec.width - len;
    if spec.left {
        out.push_str(text);
        out.extend(std::iter::repeat_n(' ', fill));
    } else if zero {
        let (sign, digits) = match text.strip_prefix(['-', '+', ' ']) {
            Some(digits) => (&text[..1], digits),
            None => ("", text),
        };
        out.push_str(sign);
        out.extend(std::iter::repeat_n('0', fill));
        out.push_str(digits);
    } else {
        out.extend(std::iter::repeat_n(' ', fill));
        out.push_str(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn args() -> TemplateArgs<'static> {
        TemplateArgs::new(7, 3.5)
    }

    #[test]
    fn legacy_and_brace_forms_render_the_same() {
        let legacy = "out_%04dts_%6.2ft.vtu";
        let translated = translate_legacy(legacy);
        assert_eq!(translated, "out_{timestep:04d}ts_{time:6.2f}t.vtu");
        let a = render(&translated, &args()).unwrap();
        let b = render("out_{timestep:04d}ts_{time:6.2f}t.vtu", &args()).unwrap();
        assert_eq!(a, "out_0007ts_  3.50t.vtu");
        assert_eq!(a, b);
    }

    #[test]
    fn legacy_named_tokens() {
        assert_eq!(translate_legacy("img_%cm_%ts_%t.png"), "img_{camera}_{timestep}_{time}.png");
        assert_eq!(translate_legacy("100%%"), "100%");
        assert_eq!(translate_legacy("%.3e"), "{time:.3f}");
        assert_eq!(translate_legacy("50%x"), "50%x");
    }

    #[test]
    fn text_without_percent_is_unchanged() {
        assert_eq!(translate_legacy("out_{timestep}.json"), "out_{timestep}.json");
    }

    #[test]
    fn default_time_format_keeps_fraction() {
        let a = TemplateArgs::new(1, 3.0);
        assert_eq!(render("{time}", &a).unwrap(), "3.0");
        let a = TemplateArgs::new(1, 0.25);
        assert_eq!(render("{time}", &a).unwrap(), "0.25");
    }

    #[test]
    fn zero_padding_goes_after_sign() {
        let a = TemplateArgs::new(-7, -1.5);
        assert_eq!(render("{timestep:05d}", &a).unwrap(), "-0007");
        assert_eq!(render("{time:07.2f}", &a).unwrap(), "-001.50");
        assert_eq!(render("{timestep:5}", &a).unwrap(), "   -7");
    }

    #[test]
    fn braces_escape() {
        assert_eq!(render("{{x}}_{timestep}", &args()).unwrap(), "{x}_7");
    }

    #[test]
    fn camera_is_left_aligned_and_truncated() {
        let a = args().with_camera("front");
        assert_eq!(render("[{camera:7}]", &a).unwrap(), "[front  ]");
        assert_eq!(render("{camera:.2s}", &a).unwrap(), "fr");
    }

    #[test]
    fn errors() {
        assert_eq!(
            render("{step}", &args()),
            Err(TemplateError::UnknownName { name: "step".into() })
        );
        assert_eq!(
            render("{time:4d}", &args()),
            Err(TemplateError::DecimalOnFloat { name: "time".into() })
        );
        assert_eq!(render("out_{time", &args()), Err(TemplateError::Unterminated { offset: 4 }));
        assert_eq!(render("a}b", &args()), Err(TemplateError::UnmatchedBrace { offset: 1 }));
        assert!(matches!(render("{time:4x}", &args()), Err(TemplateError::BadSpec { .. })));
        assert!(matches!(render("{time:.f}", &args()), Err(TemplateError::BadSpec { .. })));
        assert!(matches!(render("{camera:+}", &args()), Err(TemplateError::BadSpec { .. })));
    }

    #[test]
    fn printf_flags_render() {
        let a = TemplateArgs::new(7, 3.5);
        let cases = [
            ("%-5d", "7    "),
            ("%+d", "+7"),
            ("% d", " 7"),
            ("% +d", "+7"),
            ("%#5d", "    7"),
            ("%-05d", "7    "),
            ("%5.3d", "  007"),
            ("%08.3d", "     007"),
            ("%+.2f", "+3.50"),
            ("%-+7.1f", "+3.5   "),
            ("%+07.2f", "+003.50"),
            ("%#.0f", "4."),
        ];
        for (legacy, expected) in cases {
            assert_eq!(render(&translate_legacy(legacy), &a).as_deref(), Ok(expected), "{legacy}");
        }
        let n = TemplateArgs::new(-7, -3.5);
        assert_eq!(render(&translate_legacy("%+05d"), &n).as_deref(), Ok("-0007"));
        assert_eq!(render(&translate_legacy("% .1f"), &n).as_deref(), Ok("-3.5"));
        assert_eq!(render("{timestep:.0d}", &TemplateArgs::new(0, 0.0)).as_deref(), Ok(""));
    }

    #[test]
    fn every_translated_flag_renders() {
        let a = TemplateArgs::new(-12, 0.125).with_camera("cam");
        for flag in ["", "-", "+", " ", "#", "0", "-+", "+0", " #0"] {
            for conv in ["d", "i", "u", "6d", "6.3d", "f", ".2f", "8.3f", "e", "10.4g"] {
                let legacy = format!("out_%{flag}{conv}_%cm.vtu");
                let translated = translate_legacy(&legacy);
                assert!(render(&translated, &a).is_ok(), "{legacy} -> {translated}");
            }
        }
    }

    #[test]
    fn width_and_precision_are_capped() {
        let out_of_range = |template: &str| match render(template, &args()) {
            Err(TemplateError::BadSpec { reason, .. }) => reason,
            other => panic!("{template} rendered {other:?}"),
        };
        assert_eq!(out_of_range("out_{timestep:0100000000000000d}.vtu"), "width out of range");
        assert_eq!(out_of_range("{timestep:99999999999999999999999d}"), "width out of range");
        assert_eq!(out_of_range("{time:.1025f}"), "precision out of range");
        assert_eq!(out_of_range("{camera:2000}"), "width out of range");
        assert_eq!(
            render(&translate_legacy("%01025d"), &args()),
            Err(TemplateError::BadSpec {
                name: "timestep".into(),
                spec: "01025d".into(),
                reason: "width out of range",
            })
        );

        let widest = render(&format!("{{timestep:0{MAX_WIDTH}d}}"), &args()).unwrap();
        assert_eq!(widest.len(), MAX_WIDTH);
        assert!(widest.ends_with("0007"));
    }

    proptest! {
        #[test]
        fn padded_timestep_matches_std(ts in -100_000i64..100_000, width in 0usize..12) {
            let a = TemplateArgs::new(ts, 0.0);
            let got = render(&format!("{{timestep:0{width}d}}"), &a).unwrap();
            prop_assert_eq!(got, format!("{ts:0width$}"));
        }

        #[test]
        fn legacy_fixed_matches_brace(ts in 0i64..10_000, t in -1e4f64..1e4, w in 1usize..10, p in 0usize..5) {
            let a = TemplateArgs::new(ts, t);
            let legacy = format!("f_%0{w}d_%{w}.{p}f");
            let brace = format!("f_{{timestep:0{w}d}}_{{time:{w}.{p}f}}");
            prop_assert_eq!(render(&translate_legacy(&legacy), &a), render(&brace, &a));
        }
    }
}
