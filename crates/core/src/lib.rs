#![forbid(unsafe_code)]

pub mod values;

pub mod ids {
    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    pub struct NodeId(String);

    impl NodeId {
        pub fn as_str(&self) -> &str {
            &self.0
        }

        pub fn into_string(self) -> String {
            self.0
        }

        pub fn try_new(value: impl Into<String>) -> Result<Self, IdError> {
            let value = value.into();
            validate_id(&value)?;
            Ok(Self(value))
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    pub struct UserId(String);

    impl UserId {
        pub fn as_str(&self) -> &str {
            &self.0
        }

        pub fn try_new(value: impl Into<String>) -> Result<Self, IdError> {
            let value = value.into();
            validate_id(&value)?;
            Ok(Self(value))
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum IdError {
        Empty,
        TooLong,
        InvalidFirstChar,
        InvalidChar { ch: char, index: usize },
    }

    impl IdError {
        pub fn message(&self) -> &'static str {
            match self {
                Self::Empty => "id must not be empty",
                Self::TooLong => "id is too long",
                Self::InvalidFirstChar => "id must start with an ascii letter or digit",
                Self::InvalidChar { .. } => "id contains an unsupported character",
            }
        }
    }

    fn validate_id(value: &str) -> Result<(), IdError> {
        if value.is_empty() {
            return Err(IdError::Empty);
        }
        if value.len() > 128 {
            return Err(IdError::TooLong);
        }
        let mut chars = value.chars();
        let Some(first) = chars.next() else {
            return Err(IdError::Empty);
        };
        if !first.is_ascii_alphanumeric() {
            return Err(IdError::InvalidFirstChar);
        }
        for (index, ch) in value.chars().enumerate() {
            if index == 0 {
                continue;
            }
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-' | ':' | '@') {
                continue;
            }
            return Err(IdError::InvalidChar { ch, index });
        }
        Ok(())
    }
}

pub mod model {
    /// Upper bound for ancestor walks and status cascades. A well-formed
    /// tree never gets close; hitting it means a corrupted parent chain.
    pub const MAX_TREE_DEPTH: usize = 128;

    /// Largest accepted reeffect interval, in hours.
    pub const MAX_REEFFECT_HOURS: f64 = 1_000_000.0;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum VersionStatus {
        Active,
        Trimmed,
        Completed,
        Divider,
    }

    impl VersionStatus {
        pub fn as_str(self) -> &'static str {
            match self {
                VersionStatus::Active => "active",
                VersionStatus::Trimmed => "trimmed",
                VersionStatus::Completed => "completed",
                VersionStatus::Divider => "divider",
            }
        }

        pub fn parse(value: &str) -> Option<Self> {
            match value.trim() {
                "active" => Some(VersionStatus::Active),
                "trimmed" => Some(VersionStatus::Trimmed),
                "completed" => Some(VersionStatus::Completed),
                "divider" => Some(VersionStatus::Divider),
                _ => None,
            }
        }

        /// Divider marks a version as an organizational separator; it is
        /// the one status that never propagates to descendants.
        pub fn cascades(self) -> bool {
            !matches!(self, VersionStatus::Divider)
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum ContributionKind {
        Create,
        Value,
        Goal,
        Status,
        Schedule,
        Prestige,
        Trade,
        Delete,
    }

    impl ContributionKind {
        pub fn as_str(self) -> &'static str {
            match self {
                ContributionKind::Create => "create",
                ContributionKind::Value => "value",
                ContributionKind::Goal => "goal",
                ContributionKind::Status => "status",
                ContributionKind::Schedule => "schedule",
                ContributionKind::Prestige => "prestige",
                ContributionKind::Trade => "trade",
                ContributionKind::Delete => "delete",
            }
        }

        pub fn parse(value: &str) -> Option<Self> {
            match value.trim() {
                "create" => Some(ContributionKind::Create),
                "value" => Some(ContributionKind::Value),
                "goal" => Some(ContributionKind::Goal),
                "status" => Some(ContributionKind::Status),
                "schedule" => Some(ContributionKind::Schedule),
                "prestige" => Some(ContributionKind::Prestige),
                "trade" => Some(ContributionKind::Trade),
                "delete" => Some(ContributionKind::Delete),
                _ => None,
            }
        }
    }
}
