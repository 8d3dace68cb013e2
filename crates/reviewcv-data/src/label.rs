//! Registry of review attributes usable as prediction labels or non-NLP features

use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// A numeric review attribute stored on every review document.
///
/// Any label can be predicted; any label other than the prediction label can
/// also be fed to the learners as a non-NLP feature.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    NumGuides,
    NumGamesOwned,
    NumFriends,
    NumVotedHelpfulness,
    NumGroups,
    NumWorkshopItems,
    NumReviews,
    NumFoundFunny,
    FriendPlayerLevel,
    NumBadges,
    NumFoundHelpful,
    FoundHelpfulPercentage,
    NumComments,
    TotalGameHours,
    TotalGameHoursBin,
    TotalGameHoursLastTwoWeeks,
    NumAchievementsPercentage,
    NumAchievementsAttained,
    NumAchievementsPossible,
}

impl Label {
    pub const ALL: [Self; 19] = [
        Self::NumGuides,
        Self::NumGamesOwned,
        Self::NumFriends,
        Self::NumVotedHelpfulness,
        Self::NumGroups,
        Self::NumWorkshopItems,
        Self::NumReviews,
        Self::NumFoundFunny,
        Self::FriendPlayerLevel,
        Self::NumBadges,
        Self::NumFoundHelpful,
        Self::FoundHelpfulPercentage,
        Self::NumComments,
        Self::TotalGameHours,
        Self::TotalGameHoursBin,
        Self::TotalGameHoursLastTwoWeeks,
        Self::NumAchievementsPercentage,
        Self::NumAchievementsAttained,
        Self::NumAchievementsPossible,
    ];

    /// Field name of the label in review documents.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NumGuides => "num_guides",
            Self::NumGamesOwned => "num_games_owned",
            Self::NumFriends => "num_friends",
            Self::NumVotedHelpfulness => "num_voted_helpfulness",
            Self::NumGroups => "num_groups",
            Self::NumWorkshopItems => "num_workshop_items",
            Self::NumReviews => "num_reviews",
            Self::NumFoundFunny => "num_found_funny",
            Self::FriendPlayerLevel => "friend_player_level",
            Self::NumBadges => "num_badges",
            Self::NumFoundHelpful => "num_found_helpful",
            Self::FoundHelpfulPercentage => "found_helpful_percentage",
            Self::NumComments => "num_comments",
            Self::TotalGameHours => "total_game_hours",
            Self::TotalGameHoursBin => "total_game_hours_bin",
            Self::TotalGameHoursLastTwoWeeks => "total_game_hours_last_two_weeks",
            Self::NumAchievementsPercentage => "num_achievements_percentage",
            Self::NumAchievementsAttained => "num_achievements_attained",
            Self::NumAchievementsPossible => "num_achievements_possible",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("unrecognized label: {name}")]
pub struct UnknownLabelError {
    pub name: String,
}

impl FromStr for Label {
    type Err = UnknownLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| UnknownLabelError { name: s.to_owned() })
    }
}

/// Parses the non-NLP feature selection.
///
/// Accepts `none` (no features), `all` (every label except the prediction
/// label) or a comma-separated list of label names. The prediction label is
/// never part of the result of `all`, but an explicit list is returned as
/// given so that configuration validation can reject it.
///
/// # Errors
///
/// Returns an error for the first unknown label name.
pub fn parse_non_nlp_features_string(
    features: &str,
    prediction_label: Label,
) -> Result<BTreeSet<Label>, UnknownLabelError> {
    match features.trim() {
        "none" | "" => Ok(BTreeSet::new()),
        "all" => Ok(Label::ALL
            .into_iter()
            .filter(|l| *l != prediction_label)
            .collect()),
        list => list
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(str::parse)
            .collect(),
    }
}
