use crate::decision::PayloadField;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Agent {
    Tasks,
    Notes,
    Calendar,
    Memory,
    Conversation,
    Search,
}

impl Agent {
    pub const ALL: [Agent; 6] = [
        Self::Tasks,
        Self::Notes,
        Self::Calendar,
        Self::Memory,
        Self::Conversation,
        Self::Search,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tasks => "tasks",
            Self::Notes => "notes",
            Self::Calendar => "calendar",
            Self::Memory => "memory",
            Self::Conversation => "conversation",
            Self::Search => "search",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|agent| agent.as_str() == input)
    }

    pub fn purpose(self) -> &'static str {
        match self {
            Self::Tasks => "to-do items",
            Self::Notes => "notes",
            Self::Calendar => "calendar events",
            Self::Memory => "memory updates about the user",
            Self::Conversation => "general conversation",
            Self::Search => "search queries",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteId {
    AddTask,
    CompleteTask,
    DeleteTask,
    ListTasks,
    AddNote,
    ListNotes,
    AddEvent,
    ListEvents,
    UpdateMemory,
    Chat,
    SearchQuery,
}

/// Whether a route changes state or is passed to another collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Mutation,
    Handoff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteSpec {
    pub id: RouteId,
    pub agent: Agent,
    pub action: &'static str,
    pub required: &'static [PayloadField],
    pub outcome: RouteOutcome,
    pub hint: &'static str,
}

pub struct RouteRegistry;

const ROUTE_SPECS: [RouteSpec; 11] = [
    RouteSpec {
        id: RouteId::AddTask,
        agent: Agent::Tasks,
        action: "add",
        required: &[PayloadField::Text],
        outcome: RouteOutcome::Mutation,
        hint: "put the task wording in text",
    },
    RouteSpec {
        id: RouteId::CompleteTask,
        agent: Agent::Tasks,
        action: "complete",
        required: &[PayloadField::Id],
        outcome: RouteOutcome::Mutation,
        hint: "id must be one of the existing task ids",
    },
    RouteSpec {
        id: RouteId::DeleteTask,
        agent: Agent::Tasks,
        action: "delete",
        required: &[PayloadField::Id],
        outcome: RouteOutcome::Mutation,
        hint: "id must be one of the existing task ids",
    },
    RouteSpec {
        id: RouteId::ListTasks,
        agent: Agent::Tasks,
        action: "list",
        required: &[],
        outcome: RouteOutcome::Handoff,
        hint: "show the task list",
    },
    RouteSpec {
        id: RouteId::AddNote,
        agent: Agent::Notes,
        action: "add",
        required: &[PayloadField::Title, PayloadField::Text],
        outcome: RouteOutcome::Mutation,
        hint: "generate a short title and put the body in text",
    },
    RouteSpec {
        id: RouteId::ListNotes,
        agent: Agent::Notes,
        action: "list",
        required: &[],
        outcome: RouteOutcome::Handoff,
        hint: "show the notes",
    },
    RouteSpec {
        id: RouteId::AddEvent,
        agent: Agent::Calendar,
        action: "add",
        required: &[PayloadField::Title, PayloadField::Start, PayloadField::End],
        outcome: RouteOutcome::Mutation,
        hint: "infer start and end; assume one hour when no duration is given",
    },
    RouteSpec {
        id: RouteId::ListEvents,
        agent: Agent::Calendar,
        action: "list",
        required: &[],
        outcome: RouteOutcome::Handoff,
        hint: "show the calendar",
    },
    RouteSpec {
        id: RouteId::UpdateMemory,
        agent: Agent::Memory,
        action: "update",
        required: &[PayloadField::Key, PayloadField::Value],
        outcome: RouteOutcome::Mutation,
        hint: "key is one of name, interests, theme, voice, project",
    },
    RouteSpec {
        id: RouteId::Chat,
        agent: Agent::Conversation,
        action: "chat",
        required: &[],
        outcome: RouteOutcome::Handoff,
        hint: "anything that is not a tool request",
    },
    RouteSpec {
        id: RouteId::SearchQuery,
        agent: Agent::Search,
        action: "query",
        required: &[PayloadField::Text],
        outcome: RouteOutcome::Handoff,
        hint: "put the query in text",
    },
];

impl RouteRegistry {
    pub fn list() -> &'static [RouteSpec] {
        &ROUTE_SPECS
    }

    /// Allow-list lookup. Anything not in the table is not routable.
    pub fn lookup(agent: &str, action: &str) -> Option<&'static RouteSpec> {
        let agent = Agent::parse(agent)?;
        let action = action.trim().to_ascii_lowercase();
        ROUTE_SPECS
            .iter()
            .find(|spec| spec.agent == agent && spec.action == action)
    }

    pub fn actions_for(agent: Agent) -> impl Iterator<Item = &'static RouteSpec> {
        ROUTE_SPECS.iter().filter(move |spec| spec.agent == agent)
    }
}
