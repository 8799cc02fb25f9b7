//! Export data type streams
//!
//! Every stream maps to one export data type and one file in the extracted
//! archive. The `events_*` streams share the `Events` data type and differ
//! only by file name.

use crate::error::{Error, Result};
use crate::schema::{FieldSchema, SchemaProvider, SemanticType};
use indexmap::IndexSet;

/// One stream of the catalog
#[derive(Debug)]
pub struct StreamDefinition {
    /// Stream name, e.g. `score_indicators`
    pub name: &'static str,
    /// Data type requested from the export API
    pub data_type: &'static str,
    filename_override: Option<&'static str>,
    /// Columns identifying a record
    pub primary_keys: &'static [&'static str],
    /// Schema source
    pub schema: SchemaProvider,
}

impl StreamDefinition {
    /// Stream with a static schema
    pub fn new(
        name: &'static str,
        data_type: &'static str,
        primary_keys: &'static [&'static str],
        columns: &[(&str, SemanticType)],
    ) -> Self {
        Self {
            name,
            data_type,
            filename_override: None,
            primary_keys,
            schema: SchemaProvider::fixed(FieldSchema::from_types(columns.iter().copied())),
        }
    }

    /// Use `filename_data_type` instead of the title-cased data type in file names
    pub fn with_filename_data_type(mut self, filename_data_type: &'static str) -> Self {
        self.filename_override = Some(filename_data_type);
        self
    }

    /// Replace the schema source
    pub fn with_schema(mut self, schema: SchemaProvider) -> Self {
        self.schema = schema;
        self
    }

    /// Data type as it appears in export file names
    pub fn filename_data_type(&self) -> String {
        match self.filename_override {
            Some(name) => name.to_string(),
            None => title_case(self.data_type),
        }
    }
}

/// Title-case like Python's `str.title()`
///
/// Every letter following a non-letter is upper-cased, every other letter is
/// lower-cased: `Score_indicators` becomes `Score_Indicators`.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_is_letter = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(c);
            previous_is_letter = false;
        }
    }
    out
}

/// The set of streams a tap can export
#[derive(Debug)]
pub struct Catalog {
    streams: Vec<StreamDefinition>,
}

impl Catalog {
    /// Catalog from explicit stream definitions
    pub fn new(streams: Vec<StreamDefinition>) -> Self {
        Self { streams }
    }

    /// All CallMiner bulk export streams
    pub fn callminer() -> Self {
        Self::new(callminer_streams())
    }

    /// Streams in catalog order
    pub fn streams(&self) -> &[StreamDefinition] {
        &self.streams
    }

    /// Look up a stream by name
    pub fn get(&self, name: &str) -> Option<&StreamDefinition> {
        self.streams.iter().find(|s| s.name == name)
    }

    /// Resolve a selection to streams, in catalog order
    ///
    /// `None` selects every stream. Unknown names are an error.
    pub fn select(&self, selection: Option<&[&str]>) -> Result<Vec<&StreamDefinition>> {
        let Some(names) = selection else {
            return Ok(self.streams.iter().collect());
        };

        if let Some(unknown) = names.iter().find(|name| self.get(name).is_none()) {
            return Err(Error::UnknownStream(unknown.to_string()));
        }

        Ok(self
            .streams
            .iter()
            .filter(|s| names.contains(&s.name))
            .collect())
    }

    /// Distinct data types of `streams`, first-seen order
    pub fn export_data_types(streams: &[&StreamDefinition]) -> Vec<String> {
        let data_types: IndexSet<&str> = streams.iter().map(|s| s.data_type).collect();
        data_types.into_iter().map(str::to_string).collect()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::callminer()
    }
}

const EVENT_COLUMNS: [(&str, SemanticType); 4] = [
    ("ContactID", SemanticType::int32()),
    ("StartTime", SemanticType::Number),
    ("EndTime", SemanticType::Number),
    ("Duration", SemanticType::Number),
];

const EVENT_KEYS: &[&str] = &["ContactID", "StartTime", "EndTime"];

fn events_stream(
    name: &'static str,
    filename_data_type: &'static str,
    extra: &[(&'static str, SemanticType)],
) -> StreamDefinition {
    let columns: Vec<(&str, SemanticType)> =
        EVENT_COLUMNS.iter().chain(extra).copied().collect();
    StreamDefinition::new(name, "Events", EVENT_KEYS, &columns)
        .with_filename_data_type(filename_data_type)
}

fn callminer_streams() -> Vec<StreamDefinition> {
    use SemanticType::{Boolean, DateTime, Email, Number, String};
    let int8 = SemanticType::int8();
    let int16 = SemanticType::int16();
    let int32 = SemanticType::int32();

    vec![
        StreamDefinition::new(
            "ai_summaries",
            "Ai_summaries",
            &["ContactID"],
            &[
                ("ContactID", int32),
                ("Summary", String),
                ("ActionItems", String),
                ("Reason", String),
            ],
        ),
        StreamDefinition::new(
            "alerts",
            "Alerts",
            &["ContactID", "TimeStamp"],
            &[
                ("ContactID", int32),
                ("AlertID", int32),
                ("AlertName", String),
                ("TimeStamp", DateTime),
            ],
        ),
        StreamDefinition::new(
            "categories",
            "Categories",
            &["ContactID", "CategoryID"],
            &[
                ("ContactID", int32),
                ("CategoryID", int32),
                ("CategoryFullName", String),
                ("CategoryName", String),
                ("SectionID", int32),
                ("SectionName", String),
            ],
        ),
        StreamDefinition::new(
            "category_components",
            "Category_components",
            &["ContactID", "ComponentID", "CategoryID"],
            &[
                ("ContactID", int32),
                ("ComponentID", int32),
                ("ComponentName", String),
                ("CategoryID", int32),
                ("CategoryFullName", String),
                ("CategoryDescription", String),
                ("CategoryName", String),
                ("SectionName", String),
                ("StartTime", Number),
                ("EndTime", Number),
                ("Weight", Number),
            ],
        ),
        StreamDefinition::new(
            "client_ids",
            "Client_Ids",
            &["ContactID", "ClientID"],
            &[
                ("ContactID", int32),
                ("ClientID", String),
                ("ClientCaptureDate", DateTime),
            ],
        ),
        StreamDefinition::new(
            "coach_insights",
            "Coach_insights",
            &["ContactID", "InsightID"],
            &[
                ("ContactID", int32),
                ("InsightID", String),
                ("AssignedByUser", Email),
                ("AssignedBy", String),
                ("CreationDate", DateTime),
                ("AssignedToEmail", Email),
                ("AssignedTo", String),
                ("OriginalDueDate", DateTime),
                ("DueDate", DateTime),
                ("CompletedDate", DateTime),
                ("Indicators", String),
                ("Status", String),
                ("CurrentOwner", String),
                ("LastUpdated", DateTime),
                ("Acknowledged", Boolean),
                ("FirstListenedTime", DateTime),
                ("ContactType", String),
                ("ContactDate", DateTime),
                ("AgentEmail", Email),
                ("DisplayDescriptionsInCoach", Boolean),
                ("SnippetStart", int32),
                ("SnippetEnd", int32),
                ("ContactLength", int32),
                ("ScoreID", int16),
                ("ScoreName", String),
                ("OriginalScoreValue", Number),
                ("ScoreValue", Number),
                ("CommentDate", DateTime),
                ("CommentCreatorEmail", Email),
                ("CommentCreatorName", String),
                ("Comments", String),
                ("Type", String),
                ("CompletedByEmail", Email),
                ("CompletedBy", String),
                ("Forwarded", String),
                ("OriginalInsightID", String),
            ],
        ),
        StreamDefinition::new(
            "coach_workflows",
            "Coach_workflow",
            &["ContactID", "ID", "Timestamp"],
            &[
                ("ContactID", int32),
                ("ID", String),
                ("NewOwner", String),
                ("NewStatus", String),
                ("OldOwner", String),
                ("OldStatus", String),
                ("Timestamp", DateTime),
                ("UserName", String),
                ("ChangeType", String),
            ],
        )
        .with_filename_data_type("Coach_Workflows"),
        StreamDefinition::new(
            "comments",
            "Comments",
            &["ContactID", "CommentID"],
            &[
                ("ContactID", int32),
                ("CommentID", int32),
                ("Comment", String),
                ("CreationDate", DateTime),
                ("Author", String),
                ("LastUser", String),
                ("LastModified", DateTime),
            ],
        ),
        StreamDefinition::new("contacts", "Contacts", &["ContactID"], &[])
            .with_schema(SchemaProvider::contacts()),
        StreamDefinition::new(
            "email_metadata",
            "Email_metadata",
            &["ContactID", "StartTime"],
            &[
                ("ContactID", int32),
                ("StartTime", Number),
                ("Sent", Number),
                ("Subject", String),
                ("From", String),
                ("To", String),
                ("CC", String),
                ("BCC", String),
                ("Attachments", String),
            ],
        ),
        events_stream(
            "events_delay",
            "Events_Delay",
            &[("Speaker", int8), ("PreviousSpeaker", int8)],
        ),
        // "Segements" is how the export names the file
        events_stream(
            "events_missing_real_time_segments",
            "Events_MissingRealTimeSegements",
            &[],
        ),
        events_stream("events_overtalk", "Events_Overtalk", &[]),
        events_stream(
            "events_redaction",
            "Events_Redaction",
            &[
                ("FriendlyName", String),
                ("Text", String),
                ("EntityType", String),
                ("Description", String),
                ("RegulatoryCompliance", String),
                ("SpeakerID", int8),
                ("SpeakerName", String),
            ],
        ),
        events_stream("events_silence", "Events_Silence", &[]),
        StreamDefinition::new(
            "scores",
            "Scores",
            &["ContactID", "ScoreID"],
            &[
                ("ContactID", int32),
                ("ScoreID", int16),
                ("ScoreName", String),
                ("Score", Number),
            ],
        ),
        StreamDefinition::new(
            "score_indicators",
            "Score_indicators",
            &["ContactID", "ScoreID", "ScoreComponentID"],
            &[
                ("ContactID", int32),
                ("ScoreID", int16),
                ("ScoreComponentID", int32),
                ("ComponentFullName", String),
                ("DisplayDescription", Boolean),
                ("CurrentlyActive", Boolean),
                ("DisplayFormat", int8),
                ("DisplayOrder", int16),
                ("Value", Number),
            ],
        ),
        StreamDefinition::new(
            "tags",
            "Tags",
            &["ContactID", "TagID"],
            &[
                ("ContactID", int32),
                ("TagID", int32),
                ("TagName", String),
                ("TagFullName", String),
            ],
        ),
        StreamDefinition::new(
            "transcripts_by_speaker",
            "Transcripts_by_speaker",
            &["ContactID", "StartTime", "SpeakerID"],
            &[
                ("ContactID", int32),
                ("StartTime", Number),
                ("SpeakerID", int8),
                ("SpeakerName", String),
                ("Text", String),
            ],
        ),
    ]
}
