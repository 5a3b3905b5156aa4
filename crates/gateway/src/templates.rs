use inference::ConfidenceScores;
use minijinja::{Environment, context};
use serde::Serialize;

/// Stage text shown when the classifier could not produce a result.
pub const MODEL_ERROR_STAGE: &str = "Model Error";

const INDEX: &str = "index.html";

/// One row of the score table and one hidden field of the report form.
#[derive(Debug, Serialize)]
pub struct ScoreRow {
    pub label: &'static str,
    pub score: f64,
    pub percent: String,
}

/// What the result panel shows after an upload.
#[derive(Debug, Serialize)]
pub struct ResultView {
    pub predicted_stage: String,
    pub scores: Vec<ScoreRow>,
    /// Where the browser fetches the uploaded image; also echoed back to
    /// `/download_pdf`.
    pub image_url: Option<String>,
}

impl ResultView {
    pub fn new(
        predicted_stage: impl Into<String>,
        scores: &ConfidenceScores,
        image_url: Option<String>,
    ) -> Self {
        Self {
            predicted_stage: predicted_stage.into(),
            scores: scores
                .iter()
                .map(|(stage, score)| ScoreRow {
                    label: stage.as_str(),
                    score,
                    percent: format!("{:.2}", score * 100.0),
                })
                .collect(),
            image_url,
        }
    }

    /// Placeholder result: every score zero.
    pub fn model_error(image_url: Option<String>) -> Self {
        Self::new(MODEL_ERROR_STAGE, &ConfidenceScores::zeros(), image_url)
    }
}

/// Compiled page templates. HTML output is auto-escaped.
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template(INDEX, include_str!("../templates/index.html"))?;
        Ok(Self { env })
    }

    /// The upload page, optionally with a result or an error message.
    pub fn index(
        &self,
        result: Option<&ResultView>,
        error: Option<&str>,
    ) -> Result<String, minijinja::Error> {
        self.env
            .get_template(INDEX)?
            .render(context! { result => result, error => error })
    }
}
