use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    EnumIter,
    Deserialize,
    Serialize,
    DeriveActiveEnum,
    Default,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "sex")]
pub enum Sex {
    #[sea_orm(string_value = "Male")]
    #[default]
    Male,
    #[sea_orm(string_value = "Female")]
    Female,
    #[sea_orm(string_value = "Other")]
    Other,
}

impl Sex {
    pub fn choices() -> [Sex; 3] {
        [Sex::Male, Sex::Female, Sex::Other]
    }
}

impl std::fmt::Display for Sex {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sex::Male => write!(fmt, "Male"),
            Sex::Female => write!(fmt, "Female"),
            Sex::Other => write!(fmt, "Other"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct SexParseError;

impl FromStr for Sex {
    type Err = SexParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Male" => Ok(Sex::Male),
            "Female" => Ok(Sex::Female),
            "Other" => Ok(Sex::Other),
            _ => Err(SexParseError),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_choice_from_its_display_form() {
        for sex in Sex::choices() {
            assert_eq!(sex.to_string().parse::<Sex>(), Ok(sex));
        }
    }

    #[test]
    fn rejects_values_outside_the_choices() {
        assert_eq!("male".parse::<Sex>(), Err(SexParseError));
        assert_eq!("".parse::<Sex>(), Err(SexParseError));
    }
}
