use crate::config::UploaderConfig;
use crate::utils::format_bytes;
use super::types::file_extension;

/// The file a message is about.
#[derive(Debug, Clone, Copy)]
pub struct FileInfo<'a> {
    pub name: &'a str,
    pub size: Option<u64>,
}

impl<'a> FileInfo<'a> {
    pub fn new(name: &'a str, size: Option<u64>) -> Self {
        Self { name, size }
    }

    pub fn extension(&self) -> &'a str {
        file_extension(self.name)
    }
}

/// Fills `{{placeholder}}` tokens (case-insensitive) from the file and the limits.
///
/// Unknown tokens are left untouched. Missing values render as empty strings.
pub fn render_message(template: &str, file: FileInfo<'_>, config: &UploaderConfig) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        output.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("}}") else {
            output.push_str(&rest[open..]);
            return output;
        };

        let key = &after_open[..close];
        match placeholder_value(key, file, config) {
            Some(value) => output.push_str(&value),
            None => output.push_str(&rest[open..open + 2 + close + 2]),
        }
        rest = &after_open[close + 2..];
    }

    output.push_str(rest);
    output
}

fn placeholder_value(key: &str, file: FileInfo<'_>, config: &UploaderConfig) -> Option<String> {
    let sizes = config.accepted_size_kib;
    let value = match key.to_ascii_lowercase().as_str() {
        "filename" => file.name.to_string(),
        "filesize" => file.size.map(format_bytes).unwrap_or_default(),
        "fileextension" => file.extension().to_string(),
        "allowedextensions" => config
            .accepted_extensions
            .as_ref()
            .map(|exts| exts.join(","))
            .unwrap_or_default(),
        "allowedminsize" => sizes.min_bytes().map(format_bytes).unwrap_or_default(),
        "allowedmaxsize" => sizes.max_bytes().map(format_bytes).unwrap_or_default(),
        "maxfiles" => config.max_files.map(|n| n.to_string()).unwrap_or_default(),
        _ => return None,
    };

    Some(value)
}
