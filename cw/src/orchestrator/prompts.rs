//! Prompt templates for subtask execution
//!
//! Embedded Handlebars templates rendered with a serialize-able context.
//! The leader template asks for a full solution with filename-tagged fenced
//! blocks; role templates review the leader's explanation and artifacts
//! from their own perspective.

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use crate::domain::RoleKind;

/// System prompt for the leader's solution pass
pub const LEADER_SYSTEM: &str = "You are an experienced developer. \
Your job is to write detailed code and produce a complete solution. \
Always produce full, working, high-quality code. \
Solve the task step by step and implement every file separately. \
Explain your thinking and your architecture.";

const LEADER_TEMPLATE: &str = r#"# CODE DEVELOPMENT TASK

{{task_description}}

Please follow these steps:

1. Plan the project architecture first
2. Decide which files and directories are needed
3. Write the full code for every file in detail
4. Show example usage
5. Start each file with a short descriptive comment

NOTE: Your answer must contain complete, working code. Mark every file as a
fenced code block tagged with its filename, for example: ```app.js or
```index.html.

# TAKE YOUR TIME
There is enough time for this task. Work step by step and produce a
comprehensive solution. Explain each step in detail.
"#;

const ARCHITECT_TEMPLATE: &str = r#"# ARCHITECTURE REVIEW

Review the draft solution below from an architectural perspective.
Point out strengths and weaknesses and propose a better architecture where
needed.

# EXPLANATION
{{explanation}}

# CODE
{{artifacts_preview}}

# REVIEW FORMAT
1. Overall Architecture Assessment
2. Strengths
3. Weaknesses
4. Improvement Proposals
5. Architecture Diagram (as text)
"#;

const TESTER_TEMPLATE: &str = r#"# TEST PLAN

Prepare a comprehensive test plan for the draft solution below.
Cover unit tests, integration tests and end-to-end scenarios.

# EXPLANATION
{{explanation}}

# CODE
{{artifacts_preview}}

# TEST PLAN FORMAT
1. Test Strategy
2. Unit Test Scenarios
3. Integration Test Scenarios
4. End-to-End Test Scenarios
5. Performance Tests
6. Example Test Code
"#;

const DESIGNER_TEMPLATE: &str = r#"# USER INTERFACE DESIGN

Prepare user interface proposals for the draft solution below.
Produce concrete HTML and CSS components rather than abstract mockups.

# EXPLANATION
{{explanation}}

# CODE
{{artifacts_preview}}

# UI DESIGN FORMAT
1. General Design Principles
2. Color Palette
3. Typography
4. Components
5. Page Layouts
6. Example HTML/CSS (fully working)
"#;

const GENERAL_TEMPLATE: &str = r#"# CODE REVIEW AND IMPROVEMENT

Review and improve the draft solution below in your role as {{role_title}}.
Assess code quality, security and performance, and make concrete proposals.

# EXPLANATION
{{explanation}}

# CODE
{{artifacts_preview}}

# REVIEW FORMAT
1. Overall Assessment
2. Strengths
3. Areas to Improve
4. Improvement Proposals
5. Example Improved Code
"#;

const REVISION_TEMPLATE: &str = r#"# PREVIOUS SOLUTION

{{previous_result}}

# FEEDBACK

{{feedback}}

# NEW SOLUTION

Improve the previous solution according to the feedback.
"#;

/// Context for the leader solution template
#[derive(Debug, Serialize)]
struct LeaderContext<'a> {
    task_description: &'a str,
}

/// Context for role review templates
#[derive(Debug, Serialize)]
struct RoleContext<'a> {
    role_title: &'a str,
    explanation: &'a str,
    artifacts_preview: &'a str,
}

/// Context for the revision template
#[derive(Debug, Serialize)]
struct RevisionContext<'a> {
    previous_result: &'a str,
    feedback: &'a str,
}

/// Renders the embedded prompt templates
pub struct PromptLibrary {
    hbs: Handlebars<'static>,
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptLibrary {
    /// Create a new prompt library
    pub fn new() -> Self {
        let mut hbs = Handlebars::new();
        // Prompts are plain text; HTML escaping would mangle embedded code.
        hbs.register_escape_fn(handlebars::no_escape);
        Self { hbs }
    }

    /// Render the leader's full-solution prompt
    pub fn leader(&self, task_description: &str) -> Result<String> {
        debug!("PromptLibrary::leader: called");
        self.hbs
            .render_template(LEADER_TEMPLATE, &LeaderContext { task_description })
            .map_err(|e| eyre!("Failed to render leader template: {}", e))
    }

    /// Render a role-specific review prompt around the leader's output
    pub fn role_review(
        &self,
        role: RoleKind,
        role_title: &str,
        explanation: &str,
        artifacts_preview: &str,
    ) -> Result<String> {
        debug!(%role, "PromptLibrary::role_review: called");
        let template = match role {
            RoleKind::Architect => ARCHITECT_TEMPLATE,
            RoleKind::Tester => TESTER_TEMPLATE,
            RoleKind::Designer => DESIGNER_TEMPLATE,
            RoleKind::Lead | RoleKind::Developer | RoleKind::General => GENERAL_TEMPLATE,
        };

        self.hbs
            .render_template(
                template,
                &RoleContext {
                    role_title,
                    explanation,
                    artifacts_preview,
                },
            )
            .map_err(|e| eyre!("Failed to render role template: {}", e))
    }

    /// Render the feedback-driven revision prompt
    pub fn revision(&self, previous_result: &str, feedback: &str) -> Result<String> {
        debug!("PromptLibrary::revision: called");
        let feedback = if feedback.trim().is_empty() {
            "Improve this solution and explain it in more detail."
        } else {
            feedback
        };

        self.hbs
            .render_template(
                REVISION_TEMPLATE,
                &RevisionContext {
                    previous_result,
                    feedback,
                },
            )
            .map_err(|e| eyre!("Failed to render revision template: {}", e))
    }
}
