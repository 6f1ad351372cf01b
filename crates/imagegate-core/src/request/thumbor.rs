//! Thumbor-style path parsing.
//!
//! A Thumbor path is a run of edit tokens followed by the object key:
//! `/[unsafe/][AxB:CxD/][fit-in/][WxH/][smart/][filters:f1(..):f2(..)/][s3:bucket/]key`.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{ImageHandlerError, CODE_CANNOT_READ_PATH};
use crate::models::ThumborSegment;

fn crop_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)x(\d+):(\d+)x(\d+)$").expect("valid crop regex"))
}

fn size_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(-?\d*)x(-?\d*)$").expect("valid size regex"))
}

fn filter_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([a-z_]+)\((.*)\)$").expect("valid filter regex"))
}

/// Tokens and key recovered from a Thumbor path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ThumborPath {
    pub segments: Vec<ThumborSegment>,
    /// Bucket named by an `s3:<bucket>` segment.
    pub bucket: Option<String>,
    /// Remaining path, still percent-encoded.
    pub key: String,
    /// Whether any edit or selector token was present.
    pub has_tokens: bool,
}

/// Split on `/` outside parentheses so filter arguments may contain slashes.
fn split_path(path: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in path.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            '/' if depth == 0 => {
                parts.push(&path[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&path[start..]);
    parts.into_iter().filter(|p| !p.is_empty()).collect()
}

/// Split a `filters:` segment into its individual filter expressions.
fn split_filters(list: &str) -> Vec<&str> {
    let mut filters = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ':' if depth == 0 => {
                filters.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    filters.push(&list[start..]);
    filters.into_iter().filter(|f| !f.is_empty()).collect()
}

fn parse_filters(list: &str) -> Result<Vec<ThumborSegment>, ImageHandlerError> {
    split_filters(list)
        .into_iter()
        .map(|expr| {
            let caps = filter_regex().captures(expr).ok_or_else(|| {
                ImageHandlerError::invalid_edits(format!("Malformed filter expression '{}'", expr))
            })?;
            let args = caps[2]
                .split(',')
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect();
            Ok(ThumborSegment::Filter {
                name: caps[1].to_string(),
                args,
            })
        })
        .collect()
}

fn parse_token(part: &str) -> Result<Option<ThumborSegment>, ImageHandlerError> {
    if part == "fit-in" {
        return Ok(Some(ThumborSegment::FitIn));
    }
    if part == "smart" {
        return Ok(Some(ThumborSegment::Smart));
    }
    if let Some(caps) = crop_regex().captures(part) {
        let coord = |i: usize| {
            caps[i].parse::<u32>().map_err(|_| {
                ImageHandlerError::invalid_request(
                    CODE_CANNOT_READ_PATH,
                    format!("Crop coordinate '{}' is out of range", &caps[i]),
                )
            })
        };
        return Ok(Some(ThumborSegment::Crop {
            left: coord(1)?,
            top: coord(2)?,
            right: coord(3)?,
            bottom: coord(4)?,
        }));
    }
    if let Some(caps) = size_regex().captures(part) {
        let (width, height) = (&caps[1], &caps[2]);
        if width.trim_start_matches('-').is_empty() && height.trim_start_matches('-').is_empty() {
            return Ok(None);
        }
        return Ok(Some(ThumborSegment::Size {
            width: width.to_string(),
            height: height.to_string(),
        }));
    }
    Ok(None)
}

/// Parse a path into Thumbor tokens and key.
pub(crate) fn parse(path: &str) -> Result<ThumborPath, ImageHandlerError> {
    let parts = split_path(path);
    let mut segments = Vec::new();
    let mut bucket = None;
    let mut has_tokens = false;
    let mut index = 0;

    while index < parts.len() {
        let part = parts[index];
        if part == "unsafe" && index == 0 {
            has_tokens = true;
        } else if let Some(list) = part.strip_prefix("filters:") {
            segments.extend(parse_filters(list)?);
            has_tokens = true;
        } else if let Some(name) = part.strip_prefix("s3:") {
            bucket = Some(name.to_string());
            has_tokens = true;
        } else if let Some(segment) = parse_token(part)? {
            segments.push(segment);
            has_tokens = true;
        } else {
            break;
        }
        index += 1;
    }

    Ok(ThumborPath {
        segments,
        bucket,
        key: parts[index..].join("/"),
        has_tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fit_in_with_filter() {
        let parsed = parse("fit-in/200x200/filters:grayscale()/images/cat.png").unwrap();
        assert!(parsed.has_tokens);
        assert_eq!(parsed.key, "images/cat.png");
        assert_eq!(
            parsed.segments,
            vec![
                ThumborSegment::FitIn,
                ThumborSegment::Size {
                    width: "200".to_string(),
                    height: "200".to_string()
                },
                ThumborSegment::Filter {
                    name: "grayscale".to_string(),
                    args: vec![]
                },
            ]
        );
    }

    #[test]
    fn test_parse_crop_and_negative_size() {
        let parsed = parse("unsafe/10x20:110x220/-300x0/photo.jpg").unwrap();
        assert_eq!(
            parsed.segments[0],
            ThumborSegment::Crop {
                left: 10,
                top: 20,
                right: 110,
                bottom: 220
            }
        );
        assert_eq!(
            parsed.segments[1],
            ThumborSegment::Size {
                width: "-300".to_string(),
                height: "0".to_string()
            }
        );
        assert_eq!(parsed.key, "photo.jpg");
    }

    #[test]
    fn test_watermark_arguments_may_contain_slashes() {
        let parsed =
            parse("filters:watermark(images,logos/mark.png,10,-10,50):quality(70)/cat.png").unwrap();
        assert_eq!(parsed.key, "cat.png");
        assert_eq!(
            parsed.segments[0],
            ThumborSegment::Filter {
                name: "watermark".to_string(),
                args: vec![
                    "images".to_string(),
                    "logos/mark.png".to_string(),
                    "10".to_string(),
                    "-10".to_string(),
                    "50".to_string()
                ]
            }
        );
        assert_eq!(
            parsed.segments[1],
            ThumborSegment::Filter {
                name: "quality".to_string(),
                args: vec!["70".to_string()]
            }
        );
    }

    #[test]
    fn test_s3_bucket_selector() {
        let parsed = parse("100x0/s3:assets/deep/cat.png").unwrap();
        assert_eq!(parsed.bucket.as_deref(), Some("assets"));
        assert_eq!(parsed.key, "deep/cat.png");
    }

    #[test]
    fn test_plain_key_has_no_tokens() {
        let parsed = parse("images/cat.png").unwrap();
        assert!(!parsed.has_tokens);
        assert!(parsed.segments.is_empty());
        assert_eq!(parsed.key, "images/cat.png");
    }

    #[test]
    fn test_tokens_after_key_belong_to_key() {
        let parsed = parse("cat/100x100/x.png").unwrap();
        assert!(!parsed.has_tokens);
        assert_eq!(parsed.key, "cat/100x100/x.png");
    }

    #[test]
    fn test_malformed_filter_is_invalid_edits() {
        assert!(matches!(
            parse("filters:grayscale/cat.png"),
            Err(ImageHandlerError::InvalidEdits(_))
        ));
    }
}
