use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;
use tower_defense_core::{
    CellCoord, LevelDefinition, LevelDefinitionProvider, LevelError, PathSpec, PrefabCatalog,
    TileDimensions,
};

/// On-disk level description. Prefabs fall back to the built-in catalog.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LevelFile {
    columns: u32,
    rows: u32,
    #[serde(default)]
    tiles: TileDimensions,
    path: PathSpec,
    #[serde(default)]
    spawn: Option<CellCoord>,
    #[serde(default)]
    prefabs: Option<PrefabCatalog>,
}

/// Level definition loaded from a TOML file.
#[derive(Debug)]
pub(crate) struct TomlLevelProvider {
    definition: LevelDefinition,
}

impl TomlLevelProvider {
    /// Reads and parses the level stored at `path`.
    pub(crate) fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read level file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid level file {}", path.display()))
    }

    fn parse(text: &str) -> Result<Self> {
        let file: LevelFile = toml::from_str(text).context("malformed level TOML")?;
        let prefabs = match file.prefabs {
            Some(prefabs) => prefabs,
            None => PrefabCatalog::reference(&file.tiles)?,
        };
        Ok(Self {
            definition: LevelDefinition {
                columns: file.columns,
                rows: file.rows,
                tiles: file.tiles,
                path: file.path,
                spawn: file.spawn,
                prefabs,
            },
        })
    }
}

impl LevelDefinitionProvider for TomlLevelProvider {
    fn level_definition(&self) -> Result<LevelDefinition, LevelError> {
        Ok(self.definition.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_defense_core::prefab_names;

    const SMALL_LEVEL: &str = r#"
columns = 4
rows = 3

[tiles]
size = 2.0

[path]
waypoints = [
    { column = 0, row = 1 },
    { column = 3, row = 1 },
]
"#;

    #[test]
    fn parses_waypoint_levels_with_default_prefabs() {
        let provider = TomlLevelProvider::parse(SMALL_LEVEL).expect("valid level");
        let definition = provider.level_definition().expect("cached definition");

        assert_eq!(definition.columns, 4);
        assert_eq!(definition.rows, 3);
        assert_eq!(definition.tiles.size, 2.0);
        assert_eq!(
            definition.tiles.height,
            TileDimensions::default().height,
            "unspecified metrics keep their defaults"
        );
        assert_eq!(
            definition.path,
            PathSpec::Waypoints(vec![CellCoord::new(0, 1), CellCoord::new(3, 1)])
        );
        assert_eq!(definition.spawn_cell(), Ok(CellCoord::new(3, 1)));
        assert!(definition.prefabs.lookup(prefab_names::ENEMY).is_some());
    }

    #[test]
    fn parses_cell_bitmaps_and_explicit_spawns() {
        let text = r#"
columns = 2
rows = 2
spawn = { column = 0, row = 0 }

[path]
cells = [{ column = 0, row = 0 }, { column = 0, row = 1 }]
"#;
        let provider = TomlLevelProvider::parse(text).expect("valid level");
        let definition = provider.level_definition().expect("cached definition");

        assert_eq!(
            definition.path,
            PathSpec::Cells(vec![CellCoord::new(0, 0), CellCoord::new(0, 1)])
        );
        assert_eq!(definition.spawn, Some(CellCoord::new(0, 0)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let text = format!("{SMALL_LEVEL}\n[extra]\nvalue = 1\n");
        let error = TomlLevelProvider::parse(&text).expect_err("unknown table");
        assert_eq!(error.to_string(), "malformed level TOML");
    }

    #[test]
    fn missing_files_name_the_path() {
        let path = Path::new("definitely/not/a/level.toml");
        let error = TomlLevelProvider::from_path(path).expect_err("missing file");
        assert!(error.to_string().contains("definitely/not/a/level.toml"));
    }
}
