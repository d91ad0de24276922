//! Request validation.
//!
//! Rules are plain configuration handed to the `Validator` when application
//! state is built; each request shape declares its own checks.

use std::collections::HashSet;

use crate::errors::AppError;
use crate::models::{
    BoardsRequest, CreateBoardRequest, DeleteBoardRequest, UpdateBoardRequest,
};

/// Limits applied to incoming requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRules {
    pub max_page_size: u32,
    pub max_id_length: usize,
    pub max_name_length: usize,
    pub max_metadata_length: usize,
    pub max_members: usize,
    pub max_filter_ids: usize,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            max_page_size: 100,
            max_id_length: 128,
            max_name_length: 255,
            max_metadata_length: 65536,
            max_members: 1000,
            max_filter_ids: 1000,
        }
    }
}

/// A request shape that can check itself against the rules.
pub trait Validate {
    fn validate(&self, rules: &ValidationRules) -> Result<(), String>;
}

/// Applies a fixed rule set to requests.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    rules: ValidationRules,
}

impl Validator {
    pub fn new(rules: ValidationRules) -> Self {
        Self { rules }
    }

    pub fn check<T: Validate>(&self, request: &T) -> Result<(), AppError> {
        request.validate(&self.rules).map_err(AppError::Validation)
    }
}

fn require_id(field: &str, value: &str, rules: &ValidationRules) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", field));
    }
    if value.len() > rules.max_id_length {
        return Err(format!(
            "{} exceeds {} characters",
            field, rules.max_id_length
        ));
    }
    Ok(())
}

fn max_length(field: &str, value: &str, max: usize) -> Result<(), String> {
    if value.len() > max {
        return Err(format!("{} exceeds {} characters", field, max));
    }
    Ok(())
}

fn check_members<'a>(
    member_ids: impl ExactSizeIterator<Item = &'a str>,
    rules: &ValidationRules,
) -> Result<(), String> {
    if member_ids.len() > rules.max_members {
        return Err(format!("members exceeds {} entries", rules.max_members));
    }
    let mut seen = HashSet::new();
    for member_id in member_ids {
        require_id("members.member_id", member_id, rules)?;
        if !seen.insert(member_id) {
            return Err(format!("duplicate member {}", member_id));
        }
    }
    Ok(())
}

fn check_ids(field: &str, ids: &[String], rules: &ValidationRules) -> Result<(), String> {
    if ids.len() > rules.max_filter_ids {
        return Err(format!("{} exceeds {} entries", field, rules.max_filter_ids));
    }
    ids.iter().try_for_each(|id| require_id(field, id, rules))
}

impl Validate for CreateBoardRequest {
    fn validate(&self, rules: &ValidationRules) -> Result<(), String> {
        require_id("board_id", &self.board_id, rules)?;
        require_id("owner_id", &self.owner_id, rules)?;
        max_length("name", &self.name, rules.max_name_length)?;
        max_length("metadata", &self.metadata, rules.max_metadata_length)?;
        check_members(self.members.iter().map(|m| m.member_id.as_str()), rules)
    }
}

impl Validate for UpdateBoardRequest {
    fn validate(&self, rules: &ValidationRules) -> Result<(), String> {
        require_id("board_id", &self.board_id, rules)?;
        max_length("name", &self.name, rules.max_name_length)?;
        max_length("metadata", &self.metadata, rules.max_metadata_length)?;
        check_members(self.members.iter().map(|m| m.member_id.as_str()), rules)
    }
}

impl Validate for DeleteBoardRequest {
    fn validate(&self, rules: &ValidationRules) -> Result<(), String> {
        require_id("board_id", &self.board_id, rules)
    }
}

impl Validate for BoardsRequest {
    fn validate(&self, rules: &ValidationRules) -> Result<(), String> {
        if self.page_size == 0 || self.page_size > rules.max_page_size {
            return Err(format!(
                "page_size must be between 1 and {}",
                rules.max_page_size
            ));
        }
        check_ids("board_ids", &self.board_ids, rules)?;
        check_ids("owner_ids", &self.owner_ids, rules)?;
        check_ids("member_ids", &self.member_ids, rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateBoardMember, UpdateBoardMember};

    fn create() -> CreateBoardRequest {
        CreateBoardRequest {
            board_id: "b1".to_string(),
            owner_id: "u1".to_string(),
            name: "Sprint".to_string(),
            metadata: "{}".to_string(),
            members: vec![CreateBoardMember {
                member_id: "u2".to_string(),
                roles: vec!["editor".to_string()],
            }],
        }
    }

    #[test]
    fn test_valid_create_passes() {
        assert!(Validator::default().check(&create()).is_ok());
    }

    #[test]
    fn test_create_requires_ids() {
        let validator = Validator::default();

        let mut request = create();
        request.board_id = "  ".to_string();
        let err = validator.check(&request).unwrap_err();
        assert_eq!(err.message(), "board_id is required");

        let mut request = create();
        request.owner_id.clear();
        assert!(validator.check(&request).is_err());
    }

    #[test]
    fn test_duplicate_members_rejected() {
        let request = UpdateBoardRequest {
            board_id: "b1".to_string(),
            members: vec![
                UpdateBoardMember {
                    member_id: "m1".to_string(),
                    roles: vec![],
                    delete: true,
                },
                UpdateBoardMember {
                    member_id: "m1".to_string(),
                    roles: vec!["r2".to_string()],
                    delete: false,
                },
            ],
            ..Default::default()
        };
        let err = Validator::default().check(&request).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m == "duplicate member m1"));
    }

    #[test]
    fn test_update_does_not_need_owner() {
        let request = UpdateBoardRequest {
            board_id: "b1".to_string(),
            ..Default::default()
        };
        assert!(Validator::default().check(&request).is_ok());
    }

    #[test]
    fn test_page_size_bounds_come_from_rules() {
        let validator = Validator::new(ValidationRules {
            max_page_size: 20,
            ..Default::default()
        });
        let mut request = BoardsRequest {
            page_size: 20,
            ..Default::default()
        };
        assert!(validator.check(&request).is_ok());

        request.page_size = 21;
        assert!(validator.check(&request).is_err());

        request.page_size = 0;
        assert!(validator.check(&request).is_err());
    }

    #[test]
    fn test_filter_id_limits() {
        let validator = Validator::new(ValidationRules {
            max_filter_ids: 2,
            ..Default::default()
        });
        let request = BoardsRequest {
            page_size: 10,
            owner_ids: vec!["a".into(), "b".into(), "c".into()],
            ..Default::default()
        };
        let err = validator.check(&request).unwrap_err();
        assert_eq!(err.message(), "owner_ids exceeds 2 entries");

        let request = BoardsRequest {
            page_size: 10,
            board_ids: vec![String::new()],
            ..Default::default()
        };
        assert!(validator.check(&request).is_err());
    }

    #[test]
    fn test_name_length() {
        let validator = Validator::new(ValidationRules {
            max_name_length: 4,
            ..Default::default()
        });
        let err = validator.check(&create()).unwrap_err();
        assert_eq!(err.message(), "name exceeds 4 characters");
    }

    #[test]
    fn test_delete_requires_board_id() {
        assert!(Validator::default()
            .check(&DeleteBoardRequest::default())
            .is_err());
    }
}
