//! Language registry loaded from TOML

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::core::model::Language;
use crate::core::safety::{check_command, check_optional_command, CommandRejected};

/// Raw TOML configuration for a language
#[derive(Debug, Deserialize)]
struct RawLanguageConfig {
    id: i64,
    file_ext: String,
    compile_command: Option<String>,
    compile_artifact: Option<String>,
    run_command: String,
    image: String,
    time_limit_ms: u32,
    memory_limit_mb: u32,
}

const DEFAULT_LANGUAGES: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/files/languages.toml"));

/// Load the registry from `path`, or the embedded default when `None`
pub fn load_languages(path: Option<&Path>) -> anyhow::Result<Vec<Language>> {
    match path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read language registry {}", path.display()))?;
            parse_languages(&content)
        }
        None => parse_languages(DEFAULT_LANGUAGES),
    }
}

/// Parse registry content; entries come back ordered by id
pub fn parse_languages(content: &str) -> anyhow::Result<Vec<Language>> {
    let raw_configs: BTreeMap<String, RawLanguageConfig> =
        toml::from_str(content).context("Invalid language registry")?;

    let mut languages = Vec::with_capacity(raw_configs.len());
    for (name, raw) in raw_configs {
        if !raw.file_ext.starts_with('.') {
            anyhow::bail!("Invalid file_ext for {}: {}", name, raw.file_ext);
        }
        if raw.time_limit_ms == 0 || raw.memory_limit_mb == 0 {
            anyhow::bail!("Limits for {} must be positive", name);
        }

        let language = Language {
            id: raw.id,
            name,
            file_ext: raw.file_ext,
            compile_command: raw.compile_command,
            compile_artifact: raw.compile_artifact,
            run_command: raw.run_command,
            image: raw.image,
            time_limit_ms: raw.time_limit_ms,
            memory_limit_mb: raw.memory_limit_mb,
        };
        validate_language(&language)
            .with_context(|| format!("Language {} rejected", language.name))?;
        languages.push(language);
    }

    languages.sort_by_key(|l| l.id);
    if let Some(pair) = languages.windows(2).find(|w| w[0].id == w[1].id) {
        anyhow::bail!(
            "Duplicate language id {} ({} and {})",
            pair[0].id,
            pair[0].name,
            pair[1].name
        );
    }

    Ok(languages)
}

/// Run both commands of a language through the safety gate
pub fn validate_language(language: &Language) -> Result<(), CommandRejected> {
    check_optional_command(language.compile_command.as_deref())?;
    check_command(&language.run_command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_config(body: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", body).unwrap();
        file
    }

    #[test]
    fn test_default_registry() {
        let languages = load_languages(None).unwrap();
        assert_eq!(languages.len(), 2);

        let cpp = &languages[0];
        assert_eq!(cpp.name, "cpp");
        assert_eq!(cpp.source_file(), "main.cpp");
        assert_eq!(cpp.compile_artifact.as_deref(), Some("main"));

        let python = &languages[1];
        assert!(python.is_python());
        assert_eq!(python.run_command, "python3 main.py");
    }

    #[test]
    fn test_load_from_file() {
        let file = create_test_config(
            r#"
[c]
id = 7
file_ext = ".c"
compile_command = "gcc -O2 main.c -o main"
compile_artifact = "main"
run_command = "./main"
image = "gcc-judge:latest"
time_limit_ms = 500
memory_limit_mb = 128
"#,
        );

        let languages = load_languages(Some(file.path())).unwrap();
        assert_eq!(languages.len(), 1);
        assert_eq!(languages[0].id, 7);
        assert_eq!(languages[0].time_limit_ms, 500);
    }

    #[test]
    fn test_unsafe_command_aborts_loading() {
        let err = parse_languages(
            r#"
[evil]
id = 1
file_ext = ".sh"
run_command = "python3 main.py; rm -rf /"
image = "python-judge:latest"
time_limit_ms = 1000
memory_limit_mb = 64
"#,
        )
        .unwrap_err();

        let rejected = err.downcast_ref::<CommandRejected>();
        assert_eq!(rejected, Some(&CommandRejected::ForbiddenSequence(";")));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let body = r#"
[a]
id = 1
file_ext = ".py"
run_command = "python3 main.py"
image = "python-judge:latest"
time_limit_ms = 1000
memory_limit_mb = 64

[b]
id = 1
file_ext = ".py"
run_command = "python3 main.py"
image = "python-judge:latest"
time_limit_ms = 1000
memory_limit_mb = 64
"#;
        assert!(parse_languages(body).is_err());
    }
}
