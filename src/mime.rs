/// Content type and charset of a resource, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MimeInfo {
    /// Bare mime type, e.g. `text/css`
    pub mime_type: &'static str,
    /// Charset for textual types
    pub charset: Option<&'static str>,
}

impl MimeInfo {
    /// Value for the `Content-Type` header.
    pub fn content_type(&self) -> String {
        match self.charset {
            Some(charset) => format!("{}; charset={}", self.mime_type, charset),
            None => self.mime_type.to_string(),
        }
    }

    /// Whether responses of this type are worth compressing.
    pub fn is_compressible(&self) -> bool {
        self.charset.is_some()
            || matches!(self.mime_type, "image/svg+xml" | "application/wasm")
    }
}

/// Look up the mime information for a virtual path.
pub fn mime_info(path: &str) -> MimeInfo {
    // ".library" has no stem but is still typed by what follows the dot
    let name = path.rsplit('/').next().unwrap_or(path);
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .unwrap_or("")
        .to_lowercase();
    let (mime_type, textual) = match ext.as_str() {
        "html" | "htm" => ("text/html", true),
        "css" | "less" => ("text/css", true),
        "js" | "mjs" => ("application/javascript", true),
        "json" | "map" => ("application/json", true),
        "xml" | "library" | "theming" => ("application/xml", true),
        "txt" | "properties" | "csplog" => ("text/plain", true),
        "svg" => ("image/svg+xml", false),
        "png" => ("image/png", false),
        "jpg" | "jpeg" => ("image/jpeg", false),
        "gif" => ("image/gif", false),
        "ico" => ("image/x-icon", false),
        "woff" => ("font/woff", false),
        "woff2" => ("font/woff2", false),
        "ttf" => ("font/ttf", false),
        "wasm" => ("application/wasm", false),
        _ => ("application/octet-stream", false),
    };
    MimeInfo {
        mime_type,
        charset: textual.then_some("UTF-8"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_textual_types_carry_charset() {
        assert_eq!(mime_info("/a/b.css").content_type(), "text/css; charset=UTF-8");
        assert_eq!(mime_info("/x/.library").mime_type, "application/xml");
        assert_eq!(mime_info("/x/README").mime_type, "application/octet-stream");
    }

    #[test]
    fn test_binary_types_have_no_charset() {
        let info = mime_info("/img/logo.PNG");
        assert_eq!(info.content_type(), "image/png");
        assert!(!info.is_compressible());
    }
}
