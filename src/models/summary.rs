use crate::models::PublicationRecord;

/// What the viewer shows in the summary pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryStatus {
    #[default]
    NoSelection,
    Pending,
    Generated,
}

impl SummaryStatus {
    pub fn of(record: Option<&PublicationRecord>) -> Self {
        match record {
            None => SummaryStatus::NoSelection,
            Some(r) if r.summary_text.is_some() => SummaryStatus::Generated,
            Some(_) => SummaryStatus::Pending,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SummaryStatus::NoSelection => "",
            SummaryStatus::Pending => "Summary pending",
            SummaryStatus::Generated => "✓ Summarised",
        }
    }
}
