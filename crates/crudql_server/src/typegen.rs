//! Writes generated type information to disk.

use crate::config::TypegenConfig;
use crate::error::ServerResult;
use crudql_codegen::{CodeGenerator, Language};
use crudql_runtime::Schema;
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes every configured artifact and returns the paths written.
pub fn write(schema: &Schema, config: &TypegenConfig) -> ServerResult<Vec<PathBuf>> {
    let generator = CodeGenerator::new(schema);
    let targets = [
        (Language::Sdl, config.sdl.as_deref()),
        (Language::TypeScript, config.typescript.as_deref()),
    ];

    let mut written = Vec::new();
    for (language, path) in targets {
        let Some(path) = path else {
            continue;
        };
        write_file(path, &generator.generate(language))?;
        info!(path = %path.display(), "wrote {language:?} typegen");
        written.push(path.to_path_buf());
    }
    Ok(written)
}

fn write_file(path: &Path, contents: &str) -> ServerResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::build_schema;

    #[test]
    fn test_write() {
        let dir = std::env::temp_dir().join(format!("crudql-typegen-{}", uuid::Uuid::new_v4()));
        let config = TypegenConfig {
            sdl: Some(dir.join("nested/schema.graphql")),
            typescript: Some(dir.join("crudql-typegen.d.ts")),
        };
        let schema = build_schema().unwrap();

        let written = write(schema.schema(), &config).unwrap();
        assert_eq!(written.len(), 2);

        let sdl = std::fs::read_to_string(dir.join("nested/schema.graphql")).unwrap();
        assert!(sdl.contains("post(id: Int!): Post\n"));
        let ts = std::fs::read_to_string(dir.join("crudql-typegen.d.ts")).unwrap();
        assert!(ts.contains("export interface QueryPostArgs {\n  id: number;\n}"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_nothing_configured() {
        let schema = build_schema().unwrap();
        let written = write(schema.schema(), &TypegenConfig::default()).unwrap();
        assert!(written.is_empty());
    }
}
