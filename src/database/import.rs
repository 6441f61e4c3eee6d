use serde::Serialize;

use super::error::TypeError;
use crate::constants::{INGREDIENT_NAME_MAX_LENGTH, MEASUREMENT_UNIT_MAX_LENGTH};

/*
Ingredient seed file

name,                       measurement_unit
абрикосовое варенье,г
Salt, coarse,g              <- the unit is whatever follows the LAST comma
# lines starting with '#' and blank lines are skipped
*/

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IngredientSeed {
    pub name: String,
    pub measurement_unit: String,
}

impl TryFrom<&str> for IngredientSeed {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let (name, unit) = value
            .rsplit_once(',')
            .ok_or_else(|| TypeError::new("Invalid syntax; Missing measurement unit"))?;

        let name = name.trim().trim_matches('"').trim();
        let unit = unit.trim().trim_matches('"').trim();

        if name.is_empty() {
            return Err(TypeError::new("Invalid syntax; Empty name"));
        }
        if unit.is_empty() {
            return Err(TypeError::new("Invalid syntax; Empty measurement unit"));
        }
        if name.chars().count() > INGREDIENT_NAME_MAX_LENGTH {
            return Err(TypeError::new("Invalid syntax; Name too long"));
        }
        if unit.chars().count() > MEASUREMENT_UNIT_MAX_LENGTH {
            return Err(TypeError::new("Invalid syntax; Measurement unit too long"));
        }

        Ok(Self {
            name: name.to_owned(),
            measurement_unit: unit.to_owned(),
        })
    }
}

/// Parses a whole seed file. Errors carry the 1-based line number.
pub fn parse_ingredient_seeds(contents: &str) -> Result<Vec<IngredientSeed>, (usize, TypeError)> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(i, line)| IngredientSeed::try_from(line).map_err(|e| (i + 1, e)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_and_unit() {
        let seed = IngredientSeed::try_from("абрикосовое варенье,г").unwrap();
        assert_eq!(seed.name, "абрикосовое варенье");
        assert_eq!(seed.measurement_unit, "г");
    }

    #[test]
    fn last_comma_separates_unit() {
        let seed = IngredientSeed::try_from("\"Salt, coarse\", g").unwrap();
        assert_eq!(seed.name, "Salt, coarse");
        assert_eq!(seed.measurement_unit, "g");
    }

    #[test]
    fn rejects_broken_lines() {
        assert!(IngredientSeed::try_from("salt").is_err());
        assert!(IngredientSeed::try_from(",g").is_err());
        assert!(IngredientSeed::try_from("salt,").is_err());
        assert!(IngredientSeed::try_from("salt,kilograms please").is_err());
    }

    #[test]
    fn file_skips_comments_and_reports_line() {
        let seeds = parse_ingredient_seeds("# seed\n\nsalt,g\nmilk,ml\n").unwrap();
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[1].measurement_unit, "ml");

        let (line, _) = parse_ingredient_seeds("salt,g\nsugar\n").unwrap_err();
        assert_eq!(line, 2);
    }
}
