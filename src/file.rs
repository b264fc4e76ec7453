use std::path::{Path, PathBuf};

use crate::config::FILE_EXTENSION;
use crate::types::ProcessorMode;

/// Derives the default output path for an operation.
///
/// Encrypting appends the volume extension; decrypting strips it when
/// present and otherwise tacks on `.out` rather than overwriting the input.
pub fn output_path(input: &Path, mode: ProcessorMode) -> PathBuf {
    match mode {
        ProcessorMode::Encrypt => {
            let mut path = input.as_os_str().to_owned();
            path.push(FILE_EXTENSION);
            PathBuf::from(path)
        }
        ProcessorMode::Decrypt => {
            let path_str = input.to_string_lossy();
            if let Some(stripped) = path_str.strip_suffix(FILE_EXTENSION) {
                PathBuf::from(stripped)
            } else {
                let mut path = input.as_os_str().to_owned();
                path.push(".out");
                PathBuf::from(path)
            }
        }
    }
}

/// True when the path carries the volume extension.
pub fn is_volume(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()).map(|ext| format!(".{ext}") == FILE_EXTENSION).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_encrypt() {
        let output = output_path(Path::new("document.txt"), ProcessorMode::Encrypt);
        assert_eq!(output, PathBuf::from("document.txt.pcv"));
    }

    #[test]
    fn test_output_path_decrypt() {
        let output = output_path(Path::new("document.txt.pcv"), ProcessorMode::Decrypt);
        assert_eq!(output, PathBuf::from("document.txt"));
    }

    #[test]
    fn test_output_path_decrypt_foreign_name() {
        let output = output_path(Path::new("mystery.bin"), ProcessorMode::Decrypt);
        assert_eq!(output, PathBuf::from("mystery.bin.out"));
    }

    #[test]
    fn test_is_volume() {
        assert!(is_volume(Path::new("file.pcv")));
        assert!(!is_volume(Path::new("file.txt")));
        assert!(!is_volume(Path::new("file")));
    }
}
