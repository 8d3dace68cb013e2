//! Registry of the games whose reviews are stored in the datastore

use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// A game with a review collection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Game {
    #[serde(rename = "Arma_3")]
    Arma3,
    #[serde(rename = "Counter_Strike")]
    CounterStrike,
    #[serde(rename = "Counter_Strike_Global_Offensive")]
    CounterStrikeGlobalOffensive,
    #[serde(rename = "Dota_2")]
    Dota2,
    #[serde(rename = "Football_Manager_2015")]
    FootballManager2015,
    #[serde(rename = "Garrys_Mod")]
    GarrysMod,
    #[serde(rename = "Grand_Theft_Auto_V")]
    GrandTheftAutoV,
    #[serde(rename = "Sid_Meiers_Civilization_5")]
    SidMeiersCivilization5,
    #[serde(rename = "Team_Fortress_2")]
    TeamFortress2,
    #[serde(rename = "The_Elder_Scrolls_V")]
    TheElderScrollsV,
    #[serde(rename = "Warframe")]
    Warframe,
}

impl Game {
    pub const ALL: [Self; 11] = [
        Self::Arma3,
        Self::CounterStrike,
        Self::CounterStrikeGlobalOffensive,
        Self::Dota2,
        Self::FootballManager2015,
        Self::GarrysMod,
        Self::GrandTheftAutoV,
        Self::SidMeiersCivilization5,
        Self::TeamFortress2,
        Self::TheElderScrollsV,
        Self::Warframe,
    ];

    /// Identifier used in the datastore and in report file names.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Arma3 => "Arma_3",
            Self::CounterStrike => "Counter_Strike",
            Self::CounterStrikeGlobalOffensive => "Counter_Strike_Global_Offensive",
            Self::Dota2 => "Dota_2",
            Self::FootballManager2015 => "Football_Manager_2015",
            Self::GarrysMod => "Garrys_Mod",
            Self::GrandTheftAutoV => "Grand_Theft_Auto_V",
            Self::SidMeiersCivilization5 => "Sid_Meiers_Civilization_5",
            Self::TeamFortress2 => "Team_Fortress_2",
            Self::TheElderScrollsV => "The_Elder_Scrolls_V",
            Self::Warframe => "Warframe",
        }
    }

    /// Steam application ID.
    #[must_use]
    pub const fn app_id(self) -> &'static str {
        match self {
            Self::Arma3 => "107410",
            Self::CounterStrike => "10",
            Self::CounterStrikeGlobalOffensive => "730",
            Self::Dota2 => "570",
            Self::FootballManager2015 => "295270",
            Self::GarrysMod => "4000",
            Self::GrandTheftAutoV => "271590",
            Self::SidMeiersCivilization5 => "8930",
            Self::TeamFortress2 => "440",
            Self::TheElderScrollsV => "72850",
            Self::Warframe => "230410",
        }
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("unrecognized game: {name}")]
pub struct UnknownGameError {
    pub name: String,
}

impl FromStr for Game {
    type Err = UnknownGameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|g| g.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownGameError { name: s.to_owned() })
    }
}

/// Parses a comma-separated list of game names, or `all` for every game.
///
/// # Errors
///
/// Returns an error for the first name that is not a known game.
pub fn parse_games_string(games: &str) -> Result<BTreeSet<Game>, UnknownGameError> {
    if games.trim().eq_ignore_ascii_case("all") {
        return Ok(Game::ALL.into_iter().collect());
    }
    games
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// Label for a set of games as used in logs and report file names:
/// `all_games` when every game is selected, otherwise the names joined by
/// `", "`.
#[must_use]
pub fn games_label(games: &BTreeSet<Game>) -> String {
    if games.len() == Game::ALL.len() {
        return "all_games".to_owned();
    }
    games
        .iter()
        .map(|g| g.name())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all() {
        assert_eq!(parse_games_string("all").unwrap().len(), Game::ALL.len());
    }

    #[test]
    fn test_parse_list() {
        let games = parse_games_string("Dota_2,arma_3").unwrap();
        assert_eq!(
            games.into_iter().collect::<Vec<_>>(),
            vec![Game::Arma3, Game::Dota2]
        );
    }

    #[test]
    fn test_parse_unknown() {
        let err = parse_games_string("Dota_2,Tetris").unwrap_err();
        assert_eq!(err.name, "Tetris");
    }

    #[test]
    fn test_games_label() {
        let games = [Game::Dota2, Game::Arma3].into_iter().collect();
        assert_eq!(games_label(&games), "Arma_3, Dota_2");
        let all = Game::ALL.into_iter().collect();
        assert_eq!(games_label(&all), "all_games");
    }

    #[test]
    fn test_serde_uses_datastore_names() {
        let json = serde_json::to_string(&Game::GrandTheftAutoV).unwrap();
        assert_eq!(json, "\"Grand_Theft_Auto_V\"");
    }
}
