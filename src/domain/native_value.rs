use std::fmt;
use std::sync::Arc;

/// Native functions reachable through the checked wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeFunction {
    Connect,
    PConnect,
    Close,
    Query,
    UnbufferedQuery,
    SelectDb,
    DataSeek,
    FieldSeek,
    FreeResult,
    SetMessageHandler,
}

impl NativeFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            NativeFunction::Connect => "sybase_connect",
            NativeFunction::PConnect => "sybase_pconnect",
            NativeFunction::Close => "sybase_close",
            NativeFunction::Query => "sybase_query",
            NativeFunction::UnbufferedQuery => "sybase_unbuffered_query",
            NativeFunction::SelectDb => "sybase_select_db",
            NativeFunction::DataSeek => "sybase_data_seek",
            NativeFunction::FieldSeek => "sybase_field_seek",
            NativeFunction::FreeResult => "sybase_free_result",
            NativeFunction::SetMessageHandler => "sybase_set_message_handler",
        }
    }
}

impl fmt::Display for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of an open link held by the native layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub u32);

/// Identifier of a result set held by the native layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResultId(pub u32);

/// A message sent by the server, as handed to a [`MessageHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerMessage {
    pub number: i32,
    pub severity: i32,
    pub state: i32,
    pub line: i32,
    pub text: String,
}

/// Callback for server messages. Returning `false` lets the native layer
/// record the message as an ordinary error.
#[derive(Clone)]
pub struct MessageHandler(Arc<dyn Fn(&ServerMessage) -> bool + Send + Sync>);

impl MessageHandler {
    pub fn new(handler: impl Fn(&ServerMessage) -> bool + Send + Sync + 'static) -> Self {
        MessageHandler(Arc::new(handler))
    }

    pub fn handle(&self, message: &ServerMessage) -> bool {
        (self.0)(message)
    }
}

// Handlers compare by identity.
impl PartialEq for MessageHandler {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for MessageHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageHandler({:p})", Arc::as_ptr(&self.0))
    }
}

/// A value passed to or returned from the native layer.
///
/// Equality is strict: values of different variants are never equal, so
/// `Int(0)` and `Str("")` are distinct from `Bool(false)`.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Bool(bool),
    Int(i64),
    Str(String),
    Link(LinkId),
    Result(ResultId),
    Handler(MessageHandler),
}

impl NativeValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            NativeValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            NativeValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            NativeValue::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_link(&self) -> Option<LinkId> {
        match self {
            NativeValue::Link(link) => Some(*link),
            _ => None,
        }
    }

    pub fn as_result(&self) -> Option<ResultId> {
        match self {
            NativeValue::Result(result) => Some(*result),
            _ => None,
        }
    }

    pub fn as_handler(&self) -> Option<&MessageHandler> {
        match self {
            NativeValue::Handler(handler) => Some(handler),
            _ => None,
        }
    }
}

impl From<bool> for NativeValue {
    fn from(v: bool) -> Self {
        NativeValue::Bool(v)
    }
}

impl From<i64> for NativeValue {
    fn from(v: i64) -> Self {
        NativeValue::Int(v)
    }
}

impl From<&str> for NativeValue {
    fn from(v: &str) -> Self {
        NativeValue::Str(v.to_string())
    }
}

impl From<String> for NativeValue {
    fn from(v: String) -> Self {
        NativeValue::Str(v)
    }
}

impl From<LinkId> for NativeValue {
    fn from(v: LinkId) -> Self {
        NativeValue::Link(v)
    }
}

impl From<ResultId> for NativeValue {
    fn from(v: ResultId) -> Self {
        NativeValue::Result(v)
    }
}

impl From<MessageHandler> for NativeValue {
    fn from(v: MessageHandler) -> Self {
        NativeValue::Handler(v)
    }
}

/// The return value a native function uses to report failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Sentinel(NativeValue);

impl Sentinel {
    /// The `false` sentinel shared by every Sybase function.
    pub const FALSE: Sentinel = Sentinel(NativeValue::Bool(false));

    pub const fn new(value: NativeValue) -> Self {
        Sentinel(value)
    }

    pub fn value(&self) -> &NativeValue {
        &self.0
    }

    pub fn matches(&self, value: &NativeValue) -> bool {
        self.0 == *value
    }
}
