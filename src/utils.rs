//! # Utility Functions Module
//!
//! Small helpers for building external command lines.

/// Converts any iterable of string-like items to `Vec<String>`.
///
/// # Example
/// ```rust
/// use bulk_image_converter::utils::to_string_vec;
///
/// let args = to_string_vec(["i", "-m", "u2netp"]);
/// assert_eq!(args[2], "u2netp");
/// ```
pub fn to_string_vec<T, I>(items: I) -> Vec<String>
where
    T: ToString,
    I: IntoIterator<Item = T>,
{
    items.into_iter().map(|item| item.to_string()).collect()
}

/// Build an argument vector from mixed `Display` values.
///
/// # Example
/// ```rust
/// use bulk_image_converter::args;
///
/// let model = "isnet-general-use";
/// let args = args!["i", "-m", model, "--alpha-matting-erode-size", 10];
/// assert_eq!(args.len(), 5);
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        $crate::utils::to_string_vec([$($item.to_string()),*])
    };
}
