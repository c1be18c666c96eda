use time::{macros::format_description, Date};

use crate::applications::repo_types::{Application, Status};

pub const TITLE: &str = "ADMISSION LETTER";

/// Text of an admission letter, independent of how it is laid out.
#[derive(Debug, Clone, PartialEq)]
pub struct LetterContent {
    pub title: &'static str,
    pub date_line: String,
    pub rows: Vec<(&'static str, String)>,
    pub paragraphs: Vec<String>,
}

impl LetterContent {
    pub fn for_application(app: &Application, issued_on: Date) -> anyhow::Result<Self> {
        anyhow::ensure!(
            app.status == Status::Approved,
            "admission letter requested for {} application {}",
            app.status,
            app.application_id
        );

        let date = issued_on.format(format_description!("[month repr:long] [day], [year]"))?;
        let name = app.full_name();
        let program = app.program.title_case();

        let rows = vec![
            ("Application ID:", app.application_id.clone()),
            ("Student Name:", name.clone()),
            ("Email:", app.email.clone()),
            ("Phone:", app.phone.clone()),
            ("Program:", program.clone()),
            // `{:?}` keeps the trailing `.0` on whole numbers
            ("GPA:", format!("{:?}", app.gpa)),
        ];

        let paragraphs = vec![
            format!("Dear {name},"),
            format!(
                "We are pleased to inform you that your application for admission to our \
                 {program} program has been approved. Your application ID is {}.",
                app.application_id
            ),
            "Based on your academic background and qualifications, we are confident that you \
             will be a valuable addition to our institution."
                .to_string(),
            "Please note the following important information:".to_string(),
            "- Your application has been reviewed and approved by our admissions committee"
                .to_string(),
            "- You will receive further instructions regarding enrollment procedures".to_string(),
            "- Please keep this admission letter for your records".to_string(),
            "We look forward to welcoming you to our institution and wish you success in your \
             academic journey."
                .to_string(),
            "Best regards,".to_string(),
            "Admissions Committee".to_string(),
        ];

        Ok(Self {
            title: TITLE,
            date_line: format!("Date: {date}"),
            rows,
            paragraphs,
        })
    }

    /// All text in reading order.
    #[cfg(test)]
    pub fn plain_text(&self) -> String {
        let mut out = vec![self.title.to_string(), self.date_line.clone()];
        out.extend(self.rows.iter().map(|(k, v)| format!("{k} {v}")));
        out.extend(self.paragraphs.iter().cloned());
        out.join("\n")
    }
}
