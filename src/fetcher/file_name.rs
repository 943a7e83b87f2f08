//! File name resolution from artifact URLs

use crate::error::{Error, Result};

/// Derive the on-disk file name from a post-redirect URL
///
/// Takes the last path segment, percent-decoded but otherwise verbatim. The
/// query string and fragment are ignored. Names that could escape the target directory are rejected.
///
/// # Examples
///
/// ```
/// use modpack_dl::fetcher::file_name_from_url;
///
/// let url = url::Url::parse("https://cdn.example.com/files/4/jei%201.20.jar?x=1").unwrap();
/// assert_eq!(file_name_from_url(&url).unwrap(), "jei 1.20.jar");
/// ```
pub fn file_name_from_url(url: &url::Url) -> Result<String> {
    let invalid = || Error::InvalidFileName {
        url: url.to_string(),
    };

    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .ok_or_else(invalid)?;

    let decoded = urlencoding::decode(segment).map_err(|_| invalid())?;
    let name: &str = &decoded;

    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(invalid());
    }

    Ok(name.to_string())
}
