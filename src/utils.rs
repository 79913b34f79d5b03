//! # Utility Functions Module
//!
//! Small helpers for building subprocess argument lists.

/// Builds a `Vec<String>` of arguments from heterogeneous `Display` items.
///
/// Mixed literal/number argument lists for the transcoder read naturally:
///
/// ```rust
/// use media_compressor::args;
///
/// let crf = 28;
/// assert_eq!(args!["-crf", crf, "-preset", "medium"], vec!["-crf", "28", "-preset", "medium"]);
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        vec![$($item.to_string()),*]
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_args_macro_mixed_types() {
        let crf = 23u8;
        let preset = String::from("slow");
        let result = args!["-crf", crf, "-preset", preset, "-y",];
        assert_eq!(result, vec!["-crf", "23", "-preset", "slow", "-y"]);
    }

    #[test]
    fn test_args_macro_formatted_filter() {
        let width = 1280;
        let result = args!["-vf", format!("scale='min({},iw)':-2", width)];
        assert_eq!(result, vec!["-vf".to_string(), "scale='min(1280,iw)':-2".to_string()]);
    }

    #[test]
    fn test_args_macro_empty() {
        let result: Vec<String> = args![];
        assert!(result.is_empty());
    }
}
