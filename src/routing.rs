//! Typed parameters for the preparation pages.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

pub const COURSE_ID_PARAM: &str = "courseId";
pub const DEADLINE_ID_PARAM: &str = "deadlineId";
pub const SESSION_ID_PARAM: &str = "sessionId";

/// Course id used for user-built study sessions.
pub const CUSTOM_COURSE_ID: &str = "custom";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("`{0}` is not a preparation page path")]
    UnknownPath(String),

    #[error("missing route parameter `{0}`")]
    MissingParameter(&'static str),

    #[error("route parameter `{0}` is empty")]
    EmptyParameter(&'static str),
}

/// Trang chuẩn bị mà người dùng đang mở.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PreparationRoute {
    /// `/preparation/{courseId}/{deadlineId}`
    Deadline {
        course_id: String,
        deadline_id: String,
    },
    /// `/preparation/custom/{sessionId}`
    Custom { session_id: String },
}

fn path_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^/preparation/(?P<first>[^/]+)/(?P<second>[^/]+)/?$")
            .expect("preparation path pattern is valid")
    })
}

impl PreparationRoute {
    pub fn from_path(path: &str) -> Result<Self, RouteError> {
        let captures = path_pattern()
            .captures(path)
            .ok_or_else(|| RouteError::UnknownPath(path.to_string()))?;
        let first = &captures["first"];
        let second = captures["second"].to_string();

        if first == CUSTOM_COURSE_ID {
            return Ok(PreparationRoute::Custom { session_id: second });
        }
        Ok(PreparationRoute::Deadline {
            course_id: first.to_string(),
            deadline_id: second,
        })
    }

    /// Builds the route from a router's parameter map. A `sessionId` entry
    /// selects the custom page; otherwise both `courseId` and `deadlineId`
    /// are required.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, RouteError> {
        if params.contains_key(SESSION_ID_PARAM) {
            let session_id = required(params, SESSION_ID_PARAM)?;
            return Ok(PreparationRoute::Custom { session_id });
        }

        let course_id = required(params, COURSE_ID_PARAM)?;
        let deadline_id = required(params, DEADLINE_ID_PARAM)?;
        Ok(PreparationRoute::Deadline {
            course_id,
            deadline_id,
        })
    }

    pub fn course_id(&self) -> &str {
        match self {
            PreparationRoute::Deadline { course_id, .. } => course_id,
            PreparationRoute::Custom { .. } => CUSTOM_COURSE_ID,
        }
    }

    /// For custom sessions the session id stands in for the deadline.
    pub fn deadline_id(&self) -> &str {
        match self {
            PreparationRoute::Deadline { deadline_id, .. } => deadline_id,
            PreparationRoute::Custom { session_id } => session_id,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, PreparationRoute::Custom { .. })
    }

    pub fn path(&self) -> String {
        format!("/preparation/{}/{}", self.course_id(), self.deadline_id())
    }
}

impl fmt::Display for PreparationRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

fn required(params: &HashMap<String, String>, name: &'static str) -> Result<String, RouteError> {
    match params.get(name) {
        None => Err(RouteError::MissingParameter(name)),
        Some(value) if value.is_empty() => Err(RouteError::EmptyParameter(name)),
        Some(value) => Ok(value.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn parses_deadline_path() {
        let route = PreparationRoute::from_path("/preparation/CSE110/hw-3").unwrap();
        assert_eq!(
            route,
            PreparationRoute::Deadline {
                course_id: "CSE110".to_string(),
                deadline_id: "hw-3".to_string(),
            }
        );
        assert_eq!(route.path(), "/preparation/CSE110/hw-3");
        assert!(!route.is_custom());
    }

    #[test]
    fn trailing_slash_is_accepted() {
        let route = PreparationRoute::from_path("/preparation/1/2/").unwrap();
        assert_eq!(route.course_id(), "1");
        assert_eq!(route.deadline_id(), "2");
    }

    #[test]
    fn custom_segment_wins() {
        let route = PreparationRoute::from_path("/preparation/custom/abc").unwrap();
        assert_eq!(
            route,
            PreparationRoute::Custom {
                session_id: "abc".to_string()
            }
        );
        assert_eq!(route.course_id(), "custom");
        assert_eq!(route.deadline_id(), "abc");
    }

    #[test]
    fn rejects_other_paths() {
        for path in ["/preparation/1", "/library", "/preparation/1/2/3", "preparation/1/2"] {
            assert_eq!(
                PreparationRoute::from_path(path),
                Err(RouteError::UnknownPath(path.to_string()))
            );
        }
    }

    #[test]
    fn params_are_forwarded_unchanged() {
        let route =
            PreparationRoute::from_params(&params(&[("courseId", " 42 "), ("deadlineId", "x")]))
                .unwrap();
        assert_eq!(route.course_id(), " 42 ");
        assert_eq!(route.deadline_id(), "x");
    }

    #[test]
    fn missing_and_empty_params_are_errors() {
        assert_eq!(
            PreparationRoute::from_params(&params(&[("deadlineId", "x")])),
            Err(RouteError::MissingParameter("courseId"))
        );
        assert_eq!(
            PreparationRoute::from_params(&params(&[("courseId", "1")])),
            Err(RouteError::MissingParameter("deadlineId"))
        );
        assert_eq!(
            PreparationRoute::from_params(&params(&[("courseId", "1"), ("deadlineId", "")])),
            Err(RouteError::EmptyParameter("deadlineId"))
        );
        assert_eq!(
            PreparationRoute::from_params(&params(&[("sessionId", "")])),
            Err(RouteError::EmptyParameter("sessionId"))
        );
    }

    #[test]
    fn session_param_selects_custom_route() {
        let route = PreparationRoute::from_params(&params(&[("sessionId", "s-9")])).unwrap();
        assert!(route.is_custom());
        assert_eq!(route.path(), "/preparation/custom/s-9");
    }
}
