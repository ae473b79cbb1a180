//! Entity Snapshot Models - Client-Side Structures
//!
//! Defines the versioned entity snapshots held in the local cache and the
//! typed partial-update structures accepted by the sync coordinator.
//!
//! Entity kinds:
//! - Contact: address book record with tags and contact channels
//! - Meeting: interaction log entry tied to a contact
//! - Task: todo item with priority, status and optional recurrence
//! - CalendarEvent: scheduled event with attendees
//! - Tag / ContactGroup: organizational records
//!
//! All snapshots serialize camelCase to match the REST contract.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

// ============================================================================
// Entity Kind
// ============================================================================

/// Entity kind discriminator, also the REST path segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Contacts,
    Meetings,
    Tasks,
    Calendar,
    Tags,
    Groups,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contacts => "contacts",
            Self::Meetings => "meetings",
            Self::Tasks => "tasks",
            Self::Calendar => "calendar",
            Self::Tags => "tags",
            Self::Groups => "groups",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "contacts" => Some(Self::Contacts),
            "meetings" => Some(Self::Meetings),
            "tasks" => Some(Self::Tasks),
            "calendar" => Some(Self::Calendar),
            "tags" => Some(Self::Tags),
            "groups" => Some(Self::Groups),
            _ => None,
        }
    }
}

// ============================================================================
// Entity & Patch Traits
// ============================================================================

/// A cacheable, syncable entity snapshot
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);

    /// Bump the snapshot's updated-at timestamp
    fn touch(&mut self);
}

/// A typed partial update for one entity kind.
///
/// Only fields present in the patch are applied; serialization skips
/// absent fields so the wire payload stays a sparse diff.
pub trait Patch<E: Entity>: Serialize + Send + Sync {
    fn apply(&self, entity: &mut E);
}

// ============================================================================
// Contact
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub phones: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whatsapp_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instagram_handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthday: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anniversary: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_contacted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    /// Create a new contact snapshot with current timestamps.
    /// The id is left empty; the coordinator assigns one on create.
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            user_id: user_id.into(),
            name: name.into(),
            emails: Vec::new(),
            phones: Vec::new(),
            whatsapp_number: None,
            instagram_handle: None,
            company: None,
            tags: Vec::new(),
            address: None,
            notes: None,
            birthday: None,
            anniversary: None,
            profile_picture: None,
            last_contacted_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for Contact {
    const KIND: EntityKind = EntityKind::Contacts;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emails: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phones: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whatsapp_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instagram_handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthday: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anniversary: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_contacted_at: Option<DateTime<Utc>>,
}

impl Patch<Contact> for ContactPatch {
    fn apply(&self, contact: &mut Contact) {
        if let Some(v) = &self.name {
            contact.name = v.clone();
        }
        if let Some(v) = &self.emails {
            contact.emails = v.clone();
        }
        if let Some(v) = &self.phones {
            contact.phones = v.clone();
        }
        if let Some(v) = &self.whatsapp_number {
            contact.whatsapp_number = Some(v.clone());
        }
        if let Some(v) = &self.instagram_handle {
            contact.instagram_handle = Some(v.clone());
        }
        if let Some(v) = &self.company {
            contact.company = Some(v.clone());
        }
        if let Some(v) = &self.tags {
            contact.tags = v.clone();
        }
        if let Some(v) = &self.address {
            contact.address = Some(v.clone());
        }
        if let Some(v) = &self.notes {
            contact.notes = Some(v.clone());
        }
        if let Some(v) = self.birthday {
            contact.birthday = Some(v);
        }
        if let Some(v) = self.anniversary {
            contact.anniversary = Some(v);
        }
        if let Some(v) = &self.profile_picture {
            contact.profile_picture = Some(v.clone());
        }
        if let Some(v) = self.last_contacted_at {
            contact.last_contacted_at = Some(v);
        }
    }
}

// ============================================================================
// Meeting
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingMedium {
    PhoneCall,
    Whatsapp,
    Email,
    Sms,
    InPerson,
    VideoCall,
    InstagramDm,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: String,
    pub user_id: String,
    pub contact_id: String,
    pub meeting_date: DateTime<Utc>,
    pub medium: MeetingMedium,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub followup_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Meeting {
    pub fn new(
        user_id: impl Into<String>,
        contact_id: impl Into<String>,
        medium: MeetingMedium,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            user_id: user_id.into(),
            contact_id: contact_id.into(),
            meeting_date: now,
            medium,
            notes: None,
            outcome: None,
            followup_date: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for Meeting {
    const KIND: EntityKind = EntityKind::Meetings;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medium: Option<MeetingMedium>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub followup_date: Option<NaiveDate>,
}

impl Patch<Meeting> for MeetingPatch {
    fn apply(&self, meeting: &mut Meeting) {
        if let Some(v) = self.meeting_date {
            meeting.meeting_date = v;
        }
        if let Some(v) = self.medium {
            meeting.medium = v;
        }
        if let Some(v) = &self.notes {
            meeting.notes = Some(v.clone());
        }
        if let Some(v) = &self.outcome {
            meeting.outcome = Some(v.clone());
        }
        if let Some(v) = self.followup_date {
            meeting.followup_date = Some(v);
        }
    }
}

// ============================================================================
// Task
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

/// Task recurrence kind.
///
/// Null or unknown values coming off the wire fall back to `None`, which
/// the derived-state engine treats as "do not advance".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recurrence {
    None,
    Daily,
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl<'de> Deserialize<'de> for Recurrence {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // The field is nullable on the wire; treat null like absent.
        let s = Option::<String>::deserialize(deserializer)?;
        Ok(match s.as_deref() {
            Some("DAILY") => Self::Daily,
            Some("WEEKLY") => Self::Weekly,
            Some("BIWEEKLY") => Self::Biweekly,
            Some("MONTHLY") => Self::Monthly,
            Some("QUARTERLY") => Self::Quarterly,
            Some("YEARLY") => Self::Yearly,
            _ => Self::None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default = "default_recurrence")]
    pub recurrence: Recurrence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence_end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_recurrence() -> Recurrence {
    Recurrence::None
}

impl Task {
    pub fn new(user_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            user_id: user_id.into(),
            title: title.into(),
            description: None,
            contact_id: None,
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            due_date: None,
            completed_at: None,
            recurrence: Recurrence::None,
            recurrence_end_date: None,
            parent_task_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for Task {
    const KIND: EntityKind = EntityKind::Tasks;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence_end_date: Option<NaiveDate>,
}

impl Patch<Task> for TaskPatch {
    fn apply(&self, task: &mut Task) {
        if let Some(v) = &self.title {
            task.title = v.clone();
        }
        if let Some(v) = &self.description {
            task.description = Some(v.clone());
        }
        if let Some(v) = &self.contact_id {
            task.contact_id = Some(v.clone());
        }
        if let Some(v) = self.status {
            task.status = v;
        }
        if let Some(v) = self.priority {
            task.priority = v;
        }
        if let Some(v) = self.due_date {
            task.due_date = Some(v);
        }
        if let Some(v) = self.completed_at {
            task.completed_at = Some(v);
        }
        if let Some(v) = self.recurrence {
            task.recurrence = v;
        }
        if let Some(v) = self.recurrence_end_date {
            task.recurrence_end_date = Some(v);
        }
    }
}

// ============================================================================
// Calendar Event
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Meeting,
    Call,
    VideoCall,
    FollowUp,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Scheduled,
    Confirmed,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meet_link: Option<String>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub status: EventStatus,
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_minutes: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CalendarEvent {
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            user_id: user_id.into(),
            title: title.into(),
            description: None,
            contact_id: None,
            start_time,
            end_time,
            location: None,
            meet_link: None,
            event_type: EventType::Meeting,
            status: EventStatus::Scheduled,
            attendees: Vec::new(),
            reminder_minutes: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for CalendarEvent {
    const KIND: EntityKind = EntityKind::Calendar;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<EventType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_minutes: Option<i32>,
}

impl Patch<CalendarEvent> for EventPatch {
    fn apply(&self, event: &mut CalendarEvent) {
        if let Some(v) = &self.title {
            event.title = v.clone();
        }
        if let Some(v) = &self.description {
            event.description = Some(v.clone());
        }
        if let Some(v) = &self.contact_id {
            event.contact_id = Some(v.clone());
        }
        if let Some(v) = self.start_time {
            event.start_time = v;
        }
        if let Some(v) = self.end_time {
            event.end_time = v;
        }
        if let Some(v) = &self.location {
            event.location = Some(v.clone());
        }
        if let Some(v) = self.event_type {
            event.event_type = v;
        }
        if let Some(v) = self.status {
            event.status = v;
        }
        if let Some(v) = &self.attendees {
            event.attendees = v.clone();
        }
        if let Some(v) = self.reminder_minutes {
            event.reminder_minutes = Some(v);
        }
    }
}

// ============================================================================
// Tag & Contact Group
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub contact_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tag {
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        color: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            user_id: user_id.into(),
            name: name.into(),
            color: color.into(),
            description: None,
            contact_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for Tag {
    const KIND: EntityKind = EntityKind::Tags;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Patch<Tag> for TagPatch {
    fn apply(&self, tag: &mut Tag) {
        if let Some(v) = &self.name {
            tag.name = v.clone();
        }
        if let Some(v) = &self.color {
            tag.color = v.clone();
        }
        if let Some(v) = &self.description {
            tag.description = Some(v.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactGroup {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub contact_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContactGroup {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            user_id: user_id.into(),
            name: name.into(),
            description: None,
            color: None,
            contact_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for ContactGroup {
    const KIND: EntityKind = EntityKind::Groups;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_ids: Option<Vec<String>>,
}

impl Patch<ContactGroup> for GroupPatch {
    fn apply(&self, group: &mut ContactGroup) {
        if let Some(v) = &self.name {
            group.name = v.clone();
        }
        if let Some(v) = &self.description {
            group.description = Some(v.clone());
        }
        if let Some(v) = &self.color {
            group.color = Some(v.clone());
        }
        if let Some(v) = &self.contact_ids {
            group.contact_ids = v.clone();
        }
    }
}

// ============================================================================
// Client Configuration
// ============================================================================

/// Client configuration, persisted in the settings table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// REST API base URL, e.g. "https://rolo.example.com/api"
    pub api_base_url: String,

    /// Unique device identifier (UUID v4)
    pub device_id: String,

    /// Device name, defaults to the hostname
    pub device_name: String,

    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,

    /// How long a deleted snapshot stays restorable
    pub undo_window_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/api".to_string(),
            device_id: uuid::Uuid::new_v4().to_string(),
            device_name: default_device_name(),
            request_timeout_secs: 30,
            undo_window_secs: 30,
        }
    }
}

impl ClientConfig {
    /// Build a config from the environment (.env is honored)
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();
        if let Ok(url) = std::env::var("ROLO_API_URL") {
            config.api_base_url = url;
        }
        if let Ok(secs) = std::env::var("ROLO_REQUEST_TIMEOUT_SECS") {
            if let Ok(parsed) = secs.parse() {
                config.request_timeout_secs = parsed;
            }
        }
        config
    }
}

fn default_device_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "rolo-client".to_string())
}

// ============================================================================
// Tests
// ============================================================================
