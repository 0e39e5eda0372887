//! Preparation page controller: records the visit and hands the route ids to
//! whatever draws the preparation interface.

use crate::routing::PreparationRoute;
use crate::session::{CustomSession, CustomSessionStore, SessionDraft, SessionTracker};

/// Where the page sends the user when a custom session no longer exists.
pub const LIBRARY_PATH: &str = "/library";

/// What the renderer receives. `course_id` and `deadline_id` are the route
/// values untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparationView {
    pub course_id: String,
    pub deadline_id: String,
    pub custom_session: Option<CustomSession>,
}

/// Draws the preparation interface.
pub trait PreparationRenderer {
    fn render(&mut self, view: PreparationView);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    Rendered,
    Redirect(String),
}

pub struct PreparationPage {
    tracker: SessionTracker,
    custom_sessions: CustomSessionStore,
}

impl PreparationPage {
    pub fn new(tracker: SessionTracker, custom_sessions: CustomSessionStore) -> Self {
        Self {
            tracker,
            custom_sessions,
        }
    }

    pub fn open<R: PreparationRenderer + ?Sized>(
        &self,
        route: &PreparationRoute,
        renderer: &mut R,
    ) -> PageOutcome {
        match route {
            PreparationRoute::Deadline {
                course_id,
                deadline_id,
            } => {
                let draft = SessionDraft {
                    id: deadline_id.clone(),
                    course_id: Some(course_id.clone()),
                    deadline_id: Some(deadline_id.clone()),
                    title: format!("Preparation Session - Course {course_id}"),
                    is_custom: false,
                    path: route.path(),
                };
                if let Err(err) = self.tracker.track_session(draft) {
                    log::error!("Failed to store session info: {err}");
                }

                renderer.render(PreparationView {
                    course_id: course_id.clone(),
                    deadline_id: deadline_id.clone(),
                    custom_session: None,
                });
                PageOutcome::Rendered
            }
            PreparationRoute::Custom { session_id } => {
                let session = match self.custom_sessions.touch(session_id) {
                    Ok(Some(session)) => session,
                    Ok(None) => {
                        log::info!("Custom session {session_id} not found, redirecting");
                        return PageOutcome::Redirect(LIBRARY_PATH.to_string());
                    }
                    Err(err) => {
                        log::warn!("Could not update last access of {session_id}: {err}");
                        match self.custom_sessions.find(session_id) {
                            Some(session) => session,
                            None => return PageOutcome::Redirect(LIBRARY_PATH.to_string()),
                        }
                    }
                };

                renderer.render(PreparationView {
                    course_id: route.course_id().to_string(),
                    deadline_id: session_id.clone(),
                    custom_session: Some(session),
                });
                PageOutcome::Rendered
            }
        }
    }
}
