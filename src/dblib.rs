//! Native extension backed by FreeTDS DB-Library.
//!
//! Links and buffered result sets are owned by [`DbLibExtension`] and exposed
//! to callers as [`LinkId`] / [`ResultId`] values. DB-Library reports errors
//! and server messages through process-wide callbacks; those are written to
//! the [`last_error`](crate::last_error) slot.

use crate::{
    adapter::NativeExtension,
    config::DbLibConfig,
    domain::{
        c_binds::{
            dbcanquery, dbcancel, dbclose, dbcmd, dbcollen, dbcolname, dbcoltype, dbconvert,
            dbdata, dbdatlen, dberrhandle, dbinit, dblogin, dbloginfree, dbmsghandle, dbnextrow,
            dbnumcols, dbresults, dbsetlname, dbsetlogintime, dbsettime, dbsqlexec, dbuse,
            tdsdbopen, BYTE, DBDATETIME, DBDATETIME4, DBINT, DBPROCESS, DBSETAPP, DBSETCHARSET,
            DBSETPWD, DBSETUSER, FAIL, INT_CANCEL, LOGINREC, NO_MORE_RESULTS, NO_MORE_ROWS,
            REG_ROW, RETCODE, SUCCEED, SYBBINARY, SYBBIT, SYBCHAR, SYBDATETIME, SYBDATETIME4,
            SYBFLT8, SYBIMAGE, SYBINT1, SYBINT2, SYBINT4, SYBINT8, SYBREAL, SYBTEXT,
            SYBVARBINARY, SYBVARCHAR,
        },
        native_value::{
            LinkId, MessageHandler, NativeFunction, NativeValue, ResultId, ServerMessage,
        },
    },
    errors::{Result, SybaseError},
    last_error,
    result_set::{datetime_from_parts, smalldatetime_from_parts, Cell, ColumnMetadata, ResultSet},
};
use libc::{c_char, c_int};
use log::{debug, warn};
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};

#[derive(Debug)]
pub struct SendPtr<T>(*mut T, PhantomData<T>);

impl<T> Clone for SendPtr<T> {
    fn clone(&self) -> Self {
        SendPtr(self.0, PhantomData)
    }
}

unsafe impl<T> Send for SendPtr<T> {}

impl<T> SendPtr<T> {
    pub fn new(ptr: *mut T) -> Self {
        SendPtr(ptr, PhantomData)
    }

    pub fn as_ptr(&self) -> *mut T {
        self.0
    }

    fn key(&self) -> usize {
        self.0 as usize
    }
}

static INIT: OnceLock<bool> = OnceLock::new();
static MIN_ERROR_SEVERITY: AtomicI32 = AtomicI32::new(10);
static MIN_MESSAGE_SEVERITY: AtomicI32 = AtomicI32::new(10);

// Keyed by DBPROCESS address; GLOBAL_HANDLER applies to every link.
static MESSAGE_HANDLERS: Mutex<Vec<(usize, MessageHandler)>> = Mutex::new(Vec::new());
const GLOBAL_HANDLER: usize = 0;

fn set_handler(key: usize, handler: MessageHandler) {
    let mut handlers = MESSAGE_HANDLERS.lock().unwrap_or_else(PoisonError::into_inner);
    handlers.retain(|(k, _)| *k != key);
    handlers.push((key, handler));
}

fn remove_handler(key: usize) {
    MESSAGE_HANDLERS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .retain(|(k, _)| *k != key);
}

fn handler_for(key: usize) -> Option<MessageHandler> {
    let handlers = MESSAGE_HANDLERS.lock().unwrap_or_else(PoisonError::into_inner);
    let find = |wanted: usize| {
        handlers
            .iter()
            .find(|(k, _)| *k == wanted)
            .map(|(_, h)| h.clone())
    };
    find(key).or_else(|| find(GLOBAL_HANDLER))
}

unsafe fn c_text(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

unsafe extern "C" fn error_callback(
    _dbproc: *mut DBPROCESS,
    severity: c_int,
    _dberr: c_int,
    _oserr: c_int,
    dberrstr: *mut c_char,
    _oserrstr: *mut c_char,
) -> c_int {
    if severity >= MIN_ERROR_SEVERITY.load(Ordering::Relaxed) {
        let message = format!(
            "Sybase:  Client message:  {} (severity {})",
            c_text(dberrstr),
            severity
        );
        warn!("{}", message);
        last_error::record(message);
    }
    INT_CANCEL
}

unsafe extern "C" fn message_callback(
    dbproc: *mut DBPROCESS,
    msgno: DBINT,
    msgstate: c_int,
    severity: c_int,
    msgtext: *mut c_char,
    _srvname: *mut c_char,
    proc_: *mut c_char,
    line: c_int,
) -> c_int {
    if severity < MIN_MESSAGE_SEVERITY.load(Ordering::Relaxed) {
        return 0;
    }
    let message = ServerMessage {
        number: msgno,
        severity,
        state: msgstate,
        line,
        text: c_text(msgtext),
    };
    let handled = handler_for(dbproc as usize).is_some_and(|handler| {
        catch_unwind(AssertUnwindSafe(|| handler.handle(&message))).unwrap_or(false)
    });
    if !handled {
        let text = format!(
            "Sybase:  Server message:  {} (severity {}, procedure {})",
            message.text,
            severity,
            c_text(proc_)
        );
        warn!("{}", text);
        last_error::record(text);
    }
    0
}

/// Why an operation returned the failure sentinel.
enum Failure {
    /// DB-Library already reported through the callbacks.
    Recorded,
    Message(String),
}

impl From<String> for Failure {
    fn from(message: String) -> Self {
        Failure::Message(message)
    }
}

type OpResult<T> = std::result::Result<T, Failure>;

fn required<'a, T>(
    args: &'a [NativeValue],
    index: usize,
    read: impl Fn(&'a NativeValue) -> Option<T>,
) -> OpResult<T> {
    optional(args, index, read)?
        .ok_or_else(|| Failure::Message(format!("Sybase:  Missing argument {}", index + 1)))
}

fn optional<'a, T>(
    args: &'a [NativeValue],
    index: usize,
    read: impl Fn(&'a NativeValue) -> Option<T>,
) -> OpResult<Option<T>> {
    match args.get(index) {
        None => Ok(None),
        Some(value) => read(value).map(Some).ok_or_else(|| {
            Failure::Message(format!("Sybase:  Argument {} has the wrong type", index + 1))
        }),
    }
}

fn c_string(value: &str) -> OpResult<CString> {
    CString::new(value)
        .map_err(|e| Failure::Message(format!("Sybase:  Invalid string argument: {}", e)))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Credentials {
    servername: Option<String>,
    username: Option<String>,
    password: Option<String>,
    charset: Option<String>,
    appname: Option<String>,
}

struct Link {
    dbproc: SendPtr<DBPROCESS>,
    credentials: Credentials,
    persistent: bool,
}

struct Login(*mut LOGINREC);

impl Drop for Login {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe { dbloginfree(self.0) }
        }
    }
}

pub struct DbLibExtension {
    config: DbLibConfig,
    links: HashMap<LinkId, Link>,
    default_link: Option<LinkId>,
    results: HashMap<ResultId, ResultSet>,
    next_link: u32,
    next_result: u32,
}

impl DbLibExtension {
    /// Initializes DB-Library once per process and applies `config`.
    pub fn new(config: DbLibConfig) -> Result<Self> {
        let initialized = *INIT.get_or_init(|| unsafe {
            if dbinit() == FAIL {
                return false;
            }
            dberrhandle(Some(error_callback));
            dbmsghandle(Some(message_callback));
            true
        });
        if !initialized {
            return Err(SybaseError::InitFailed);
        }

        MIN_ERROR_SEVERITY.store(config.min_error_severity, Ordering::Relaxed);
        MIN_MESSAGE_SEVERITY.store(config.min_message_severity, Ordering::Relaxed);
        unsafe {
            if let Some(seconds) = config.login_timeout {
                dbsetlogintime(c_int::try_from(seconds).unwrap_or(c_int::MAX));
            }
            if let Some(seconds) = config.query_timeout {
                dbsettime(c_int::try_from(seconds).unwrap_or(c_int::MAX));
            }
        }

        Ok(DbLibExtension {
            config,
            links: HashMap::new(),
            default_link: None,
            results: HashMap::new(),
            next_link: 1,
            next_result: 1,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(DbLibConfig::from_env()?)
    }

    pub fn config(&self) -> &DbLibConfig {
        &self.config
    }

    /// The link used when a call omits one.
    pub fn default_link(&self) -> Option<LinkId> {
        self.default_link
    }

    pub fn result(&self, id: ResultId) -> Option<&ResultSet> {
        self.results.get(&id)
    }

    pub fn result_mut(&mut self, id: ResultId) -> Option<&mut ResultSet> {
        self.results.get_mut(&id)
    }

    fn connect(&mut self, args: &[NativeValue], persistent: bool) -> OpResult<NativeValue> {
        let text = |index| optional(args, index, NativeValue::as_str);
        let credentials = Credentials {
            servername: text(0)?.map(str::to_owned),
            username: text(1)?.map(str::to_owned),
            password: text(2)?.map(str::to_owned),
            charset: text(3)?.map(str::to_owned),
            appname: text(4)?.map(str::to_owned),
        };
        let force_new = !persistent && optional(args, 5, NativeValue::as_bool)?.unwrap_or(false);
        let persistent = persistent && self.config.allow_persistent;

        if !force_new {
            let existing = self
                .links
                .iter()
                .find(|(_, link)| link.persistent == persistent && link.credentials == credentials)
                .map(|(id, _)| *id);
            if let Some(id) = existing {
                debug!("Reusing link {}", id.0);
                self.default_link = Some(id);
                return Ok(NativeValue::Link(id));
            }
        }

        if let Some(max) = self.config.max_links {
            if self.links.len() >= max {
                return Err(format!("Sybase:  Too many open links ({})", self.links.len()).into());
            }
        }

        let dbproc = open(&credentials)?;
        let id = LinkId(self.next_link);
        self.next_link += 1;
        debug!(
            "Opened link {} to {} (persistent: {})",
            id.0,
            credentials.servername.as_deref().unwrap_or("default server"),
            persistent
        );
        self.links.insert(
            id,
            Link {
                dbproc,
                credentials,
                persistent,
            },
        );
        self.default_link = Some(id);
        Ok(NativeValue::Link(id))
    }

    fn close(&mut self, args: &[NativeValue]) -> OpResult<NativeValue> {
        let id = match optional(args, 0, NativeValue::as_link)?.or(self.default_link) {
            Some(id) => id,
            None => return Err("Sybase:  No link is open".to_string().into()),
        };
        let persistent = match self.links.get(&id) {
            Some(link) => link.persistent,
            None => return Err(format!("Sybase:  Link {} is not open", id.0).into()),
        };
        if persistent {
            return Ok(NativeValue::Bool(true));
        }
        if let Some(link) = self.links.remove(&id) {
            close_link(&link);
        }
        if self.default_link == Some(id) {
            self.default_link = None;
        }
        debug!("Closed link {}", id.0);
        Ok(NativeValue::Bool(true))
    }

    /// The given link, or the default one, opening a default link if needed.
    fn resolve_link(&mut self, link: Option<LinkId>) -> OpResult<SendPtr<DBPROCESS>> {
        let id = match link.or(self.default_link) {
            Some(id) => id,
            None => match self.connect(&[], false)? {
                NativeValue::Link(id) => id,
                _ => return Err(Failure::Recorded),
            },
        };
        self.links
            .get(&id)
            .map(|link| link.dbproc.clone())
            .ok_or_else(|| format!("Sybase:  Link {} is not open", id.0).into())
    }

    fn select_db(&mut self, args: &[NativeValue]) -> OpResult<NativeValue> {
        let name = c_string(required(args, 0, NativeValue::as_str)?)?;
        let dbproc = self.resolve_link(optional(args, 1, NativeValue::as_link)?)?;
        if unsafe { dbuse(dbproc.as_ptr(), name.as_ptr()) } == SUCCEED {
            Ok(NativeValue::Bool(true))
        } else {
            Err(Failure::Recorded)
        }
    }

    fn query(&mut self, args: &[NativeValue]) -> OpResult<NativeValue> {
        let query = c_string(required(args, 0, NativeValue::as_str)?)?;
        let dbproc = self.resolve_link(optional(args, 1, NativeValue::as_link)?)?;
        self.execute(&dbproc, &query, true)
    }

    fn unbuffered_query(&mut self, args: &[NativeValue]) -> OpResult<NativeValue> {
        let query = c_string(required(args, 0, NativeValue::as_str)?)?;
        let link = required(args, 1, NativeValue::as_link)?;
        let store_result = optional(args, 2, NativeValue::as_bool)?.unwrap_or(true);
        let dbproc = self.resolve_link(Some(link))?;
        self.execute(&dbproc, &query, store_result)
    }

    fn execute(
        &mut self,
        dbproc: &SendPtr<DBPROCESS>,
        query: &CStr,
        store_result: bool,
    ) -> OpResult<NativeValue> {
        let proc_ = dbproc.as_ptr();
        unsafe {
            if dbcmd(proc_, query.as_ptr()) == FAIL || dbsqlexec(proc_) == FAIL {
                dbcancel(proc_);
                return Err(Failure::Recorded);
            }
        }
        let has_columns = skip_to_columns(
            || unsafe {
                let status = dbresults(proc_);
                let columns = if status == SUCCEED { dbnumcols(proc_) } else { 0 };
                (status, columns)
            },
            || unsafe {
                dbcanquery(proc_);
            },
        );
        match has_columns {
            Ok(true) => {}
            Ok(false) => return Ok(NativeValue::Bool(true)),
            Err(failure) => {
                unsafe { dbcancel(proc_) };
                return Err(failure);
            }
        }

        let columns = unsafe { describe_columns(proc_) };
        let rows = if store_result {
            unsafe { fetch_rows(proc_, &columns)? }
        } else {
            unsafe { dbcanquery(proc_) };
            Vec::new()
        };
        drain_results(proc_);

        let id = ResultId(self.next_result);
        self.next_result += 1;
        debug!(
            "Buffered result {} with {} rows and {} columns",
            id.0,
            rows.len(),
            columns.len()
        );
        self.results.insert(id, ResultSet::new(columns, rows));
        Ok(NativeValue::Result(id))
    }

    fn buffered(&mut self, args: &[NativeValue]) -> OpResult<(ResultId, &mut ResultSet)> {
        let id = required(args, 0, NativeValue::as_result)?;
        match self.results.get_mut(&id) {
            Some(result) => Ok((id, result)),
            None => Err(format!("Sybase:  {} is not a valid result", id.0).into()),
        }
    }

    fn data_seek(&mut self, args: &[NativeValue]) -> OpResult<NativeValue> {
        let row = required(args, 1, NativeValue::as_int)?;
        let (_, result) = self.buffered(args)?;
        if result.seek_row(row) {
            Ok(NativeValue::Bool(true))
        } else {
            Err(format!(
                "Sybase:  Bad row offset {}, must be between 0 and {}",
                row,
                result.num_rows() as i64 - 1
            )
            .into())
        }
    }

    fn field_seek(&mut self, args: &[NativeValue]) -> OpResult<NativeValue> {
        let field = required(args, 1, NativeValue::as_int)?;
        let (_, result) = self.buffered(args)?;
        if result.seek_field(field) {
            Ok(NativeValue::Bool(true))
        } else {
            Err(format!("Sybase:  Bad column offset {}", field).into())
        }
    }

    fn free_result(&mut self, args: &[NativeValue]) -> OpResult<NativeValue> {
        let (id, _) = self.buffered(args)?;
        self.results.remove(&id);
        Ok(NativeValue::Bool(true))
    }

    fn set_message_handler(&mut self, args: &[NativeValue]) -> OpResult<NativeValue> {
        let handler = required(args, 0, NativeValue::as_handler)?.clone();
        let key = match optional(args, 1, NativeValue::as_link)? {
            Some(id) => match self.links.get(&id) {
                Some(link) => link.dbproc.key(),
                None => return Err(format!("Sybase:  Link {} is not open", id.0).into()),
            },
            None => GLOBAL_HANDLER,
        };
        set_handler(key, handler);
        Ok(NativeValue::Bool(true))
    }
}

impl NativeExtension for DbLibExtension {
    fn call(&mut self, function: NativeFunction, args: &[NativeValue]) -> NativeValue {
        let result = match function {
            NativeFunction::Connect => self.connect(args, false),
            NativeFunction::PConnect => self.connect(args, true),
            NativeFunction::Close => self.close(args),
            NativeFunction::Query => self.query(args),
            NativeFunction::UnbufferedQuery => self.unbuffered_query(args),
            NativeFunction::SelectDb => self.select_db(args),
            NativeFunction::DataSeek => self.data_seek(args),
            NativeFunction::FieldSeek => self.field_seek(args),
            NativeFunction::FreeResult => self.free_result(args),
            NativeFunction::SetMessageHandler => self.set_message_handler(args),
        };
        match result {
            Ok(value) => value,
            Err(Failure::Recorded) => NativeValue::Bool(false),
            Err(Failure::Message(message)) => {
                warn!("{}", message);
                last_error::record(message);
                NativeValue::Bool(false)
            }
        }
    }
}

impl Drop for DbLibExtension {
    fn drop(&mut self) {
        for (_, link) in self.links.drain() {
            close_link(&link);
        }
    }
}

fn open(credentials: &Credentials) -> OpResult<SendPtr<DBPROCESS>> {
    let login = Login(unsafe { dblogin() });
    if login.0.is_null() {
        return Err("Sybase:  Unable to allocate login record".to_string().into());
    }
    let names = [
        (&credentials.username, DBSETUSER),
        (&credentials.password, DBSETPWD),
        (&credentials.charset, DBSETCHARSET),
        (&credentials.appname, DBSETAPP),
    ];
    for (value, which) in names {
        if let Some(value) = value {
            let value = c_string(value)?;
            unsafe { dbsetlname(login.0, value.as_ptr(), which) };
        }
    }
    let server = credentials.servername.as_deref().map(c_string).transpose()?;
    let server_ptr = server.as_ref().map_or(std::ptr::null(), |s| s.as_ptr());

    let dbproc = unsafe { tdsdbopen(login.0, server_ptr, 0) };
    if dbproc.is_null() {
        return Err("Sybase:  Unable to connect to server".to_string().into());
    }
    Ok(SendPtr::new(dbproc))
}

fn close_link(link: &Link) {
    remove_handler(link.dbproc.key());
    unsafe { dbclose(link.dbproc.as_ptr()) };
}

/// Steps through a batch until a result with columns is current.
///
/// `next` advances to the following result and reports its status with its
/// column count. Column-less results (`set nocount on`, `update`, ...) are
/// passed to `discard`. `false` means the batch ended without any columns.
fn skip_to_columns(
    mut next: impl FnMut() -> (RETCODE, c_int),
    mut discard: impl FnMut(),
) -> OpResult<bool> {
    loop {
        match next() {
            (SUCCEED, 0) => discard(),
            (SUCCEED, _) => return Ok(true),
            (NO_MORE_RESULTS, _) => return Ok(false),
            _ => return Err(Failure::Recorded),
        }
    }
}

fn drain_results(dbproc: *mut DBPROCESS) {
    unsafe {
        while dbresults(dbproc) == SUCCEED {
            dbcanquery(dbproc);
        }
    }
}

unsafe fn describe_columns(dbproc: *mut DBPROCESS) -> Vec<ColumnMetadata> {
    (1..=dbnumcols(dbproc))
        .map(|column| ColumnMetadata {
            name: c_text(dbcolname(dbproc, column)),
            data_type: dbcoltype(dbproc, column),
            column_size: u32::try_from(dbcollen(dbproc, column)).unwrap_or(0),
        })
        .collect()
}

unsafe fn fetch_rows(
    dbproc: *mut DBPROCESS,
    columns: &[ColumnMetadata],
) -> OpResult<Vec<Vec<Cell>>> {
    let mut rows = Vec::new();
    loop {
        match dbnextrow(dbproc) {
            REG_ROW => rows.push(
                columns
                    .iter()
                    .zip(1..)
                    .map(|(column, index)| read_cell(dbproc, index, column.data_type))
                    .collect(),
            ),
            NO_MORE_ROWS => break,
            FAIL => return Err(Failure::Recorded),
            // Compute rows are skipped
            _ => continue,
        }
    }
    Ok(rows)
}

unsafe fn read_cell(dbproc: *mut DBPROCESS, column: c_int, data_type: c_int) -> Cell {
    let data = dbdata(dbproc, column);
    let len = dbdatlen(dbproc, column);
    if data.is_null() || len < 0 {
        return Cell::Null;
    }
    let bytes = std::slice::from_raw_parts(data as *const BYTE, len as usize);
    match data_type {
        SYBINT1 | SYBBIT => Cell::Int(i64::from(*data)),
        SYBINT2 => Cell::Int(i64::from(std::ptr::read_unaligned(data as *const i16))),
        SYBINT4 => Cell::Int(i64::from(std::ptr::read_unaligned(data as *const i32))),
        SYBINT8 => Cell::Int(std::ptr::read_unaligned(data as *const i64)),
        SYBFLT8 => Cell::Float(std::ptr::read_unaligned(data as *const f64)),
        SYBREAL => Cell::Float(f64::from(std::ptr::read_unaligned(data as *const f32))),
        SYBCHAR | SYBVARCHAR | SYBTEXT => Cell::Text(String::from_utf8_lossy(bytes).into_owned()),
        SYBBINARY | SYBVARBINARY | SYBIMAGE => Cell::Binary(bytes.to_vec()),
        SYBDATETIME => {
            let value = std::ptr::read_unaligned(data as *const DBDATETIME);
            datetime_from_parts(value.dtdays, value.dttime)
                .map_or_else(|| convert_to_text(dbproc, data_type, data, len), Cell::DateTime)
        }
        SYBDATETIME4 => {
            let value = std::ptr::read_unaligned(data as *const DBDATETIME4);
            smalldatetime_from_parts(value.days, value.minutes)
                .map_or_else(|| convert_to_text(dbproc, data_type, data, len), Cell::DateTime)
        }
        _ => convert_to_text(dbproc, data_type, data, len),
    }
}

unsafe fn convert_to_text(
    dbproc: *mut DBPROCESS,
    data_type: c_int,
    data: *const BYTE,
    len: DBINT,
) -> Cell {
    let mut buffer = [0u8; 256];
    let written = dbconvert(
        dbproc,
        data_type,
        data,
        len,
        SYBCHAR,
        buffer.as_mut_ptr(),
        buffer.len() as DBINT,
    );
    match usize::try_from(written) {
        Ok(written) => {
            let text = String::from_utf8_lossy(&buffer[..written.min(buffer.len())]);
            Cell::Text(text.trim_end_matches([' ', '\0']).to_string())
        }
        Err(_) => Cell::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::last_error::{LastErrorSource, ProcessLastError, SLOT_LOCK};
    use std::collections::VecDeque;
    use std::sync::{Arc, MutexGuard};

    const LINK_PROC: usize = 0x1000;
    const OTHER_PROC: usize = 0x2000;

    // The error slot, handler registry and severity floors are process-wide.
    fn lock() -> MutexGuard<'static, ()> {
        SLOT_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn column(name: &str) -> ColumnMetadata {
        ColumnMetadata {
            name: name.to_string(),
            data_type: SYBINT4,
            column_size: 4,
        }
    }

    /// An extension holding result 1 (3 rows, 2 columns) and no links.
    fn extension(config: DbLibConfig) -> DbLibExtension {
        let rows: Vec<Vec<Cell>> = (1..=3).map(|n| vec![Cell::Int(n), Cell::Null]).collect();
        DbLibExtension {
            config,
            links: HashMap::new(),
            default_link: None,
            results: HashMap::from([(
                ResultId(1),
                ResultSet::new(vec![column("au_id"), column("au_lname")], rows),
            )]),
            next_link: 1,
            next_result: 2,
        }
    }

    fn fake_link(address: usize, persistent: bool) -> Link {
        Link {
            dbproc: SendPtr::new(address as *mut DBPROCESS),
            credentials: Credentials::default(),
            persistent,
        }
    }

    /// Calls `function`, expects the failure sentinel and returns the recorded text.
    fn failing_call(
        ext: &mut DbLibExtension,
        function: NativeFunction,
        args: &[NativeValue],
    ) -> Option<String> {
        ProcessLastError.clear();
        assert_eq!(ext.call(function, args), NativeValue::Bool(false));
        ProcessLastError.last_message()
    }

    fn deliver(address: usize, severity: c_int, text: &str) -> c_int {
        let text = CString::new(text).unwrap();
        let procedure = CString::new("sp_report").unwrap();
        unsafe {
            message_callback(
                address as *mut DBPROCESS,
                207,
                1,
                severity,
                text.as_ptr() as *mut c_char,
                std::ptr::null_mut(),
                procedure.as_ptr() as *mut c_char,
                3,
            )
        }
    }

    #[test]
    fn seeking_out_of_range_records_the_offset() {
        let _guard = lock();
        let mut ext = extension(DbLibConfig::default());
        let args = |offset: i64| [NativeValue::Result(ResultId(1)), NativeValue::Int(offset)];

        assert_eq!(
            failing_call(&mut ext, NativeFunction::DataSeek, &args(9)).as_deref(),
            Some("Sybase:  Bad row offset 9, must be between 0 and 2")
        );
        assert_eq!(
            failing_call(&mut ext, NativeFunction::FieldSeek, &args(5)).as_deref(),
            Some("Sybase:  Bad column offset 5")
        );
        assert_eq!(
            failing_call(&mut ext, NativeFunction::FieldSeek, &args(-1)).as_deref(),
            Some("Sybase:  Bad column offset -1")
        );

        assert_eq!(
            ext.call(NativeFunction::DataSeek, &args(2)),
            NativeValue::Bool(true)
        );
        let row = ext.result_mut(ResultId(1)).unwrap().fetch_row().unwrap();
        assert_eq!(row[0], Cell::Int(3));
    }

    #[test]
    fn free_result_rejects_unknown_ids() {
        let _guard = lock();
        let mut ext = extension(DbLibConfig::default());

        assert_eq!(
            failing_call(&mut ext, NativeFunction::FreeResult, &[ResultId(7).into()]).as_deref(),
            Some("Sybase:  7 is not a valid result")
        );
        assert_eq!(
            ext.call(NativeFunction::FreeResult, &[ResultId(1).into()]),
            NativeValue::Bool(true)
        );
        assert!(ext.result(ResultId(1)).is_none());
        assert_eq!(
            failing_call(&mut ext, NativeFunction::FreeResult, &[ResultId(1).into()]).as_deref(),
            Some("Sybase:  1 is not a valid result")
        );
    }

    #[test]
    fn close_requires_an_open_link() {
        let _guard = lock();
        let mut ext = extension(DbLibConfig::default());

        assert_eq!(
            failing_call(&mut ext, NativeFunction::Close, &[]).as_deref(),
            Some("Sybase:  No link is open")
        );
        assert_eq!(
            failing_call(&mut ext, NativeFunction::Close, &[LinkId(4).into()]).as_deref(),
            Some("Sybase:  Link 4 is not open")
        );

        ext.links.insert(LinkId(1), fake_link(LINK_PROC, true));
        ext.default_link = Some(LinkId(1));
        let closed = ext.call(NativeFunction::Close, &[]);
        let kept = ext.links.contains_key(&LinkId(1));
        ext.links.clear();

        assert_eq!(closed, NativeValue::Bool(true));
        assert!(kept, "persistent links stay open");
    }

    #[test]
    fn link_limit_is_checked_before_connecting() {
        let _guard = lock();
        let config = DbLibConfig {
            max_links: Some(0),
            ..DbLibConfig::default()
        };
        let mut ext = extension(config);

        assert_eq!(
            failing_call(&mut ext, NativeFunction::Connect, &["SYBASE".into()]).as_deref(),
            Some("Sybase:  Too many open links (0)")
        );
        assert_eq!(ext.default_link(), None);
    }

    #[test]
    fn handler_for_unknown_link_is_rejected() {
        let _guard = lock();
        remove_handler(GLOBAL_HANDLER);
        let mut ext = extension(DbLibConfig::default());
        let handler = MessageHandler::new(|_| true);

        assert_eq!(
            failing_call(
                &mut ext,
                NativeFunction::SetMessageHandler,
                &[handler.into(), LinkId(9).into()]
            )
            .as_deref(),
            Some("Sybase:  Link 9 is not open")
        );
        assert!(handler_for(GLOBAL_HANDLER).is_none());
    }

    #[test]
    fn link_handler_takes_priority_over_global() {
        let _guard = lock();
        MIN_MESSAGE_SEVERITY.store(10, Ordering::Relaxed);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = |name: &'static str| {
            let seen = Arc::clone(&seen);
            MessageHandler::new(move |message| {
                seen.lock().unwrap().push((name, message.number));
                true
            })
        };

        let mut ext = extension(DbLibConfig::default());
        ext.links.insert(LinkId(1), fake_link(LINK_PROC, false));
        let on_link = ext.call(
            NativeFunction::SetMessageHandler,
            &[recorder("link").into(), LinkId(1).into()],
        );
        let global = ext.call(NativeFunction::SetMessageHandler, &[recorder("global").into()]);
        ext.links.clear();
        assert_eq!(on_link, NativeValue::Bool(true));
        assert_eq!(global, NativeValue::Bool(true));

        ProcessLastError.clear();
        deliver(LINK_PROC, 16, "Invalid column name 'x'.");
        deliver(OTHER_PROC, 16, "Invalid column name 'y'.");
        remove_handler(LINK_PROC);
        remove_handler(GLOBAL_HANDLER);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![("link", 207), ("global", 207)]
        );
        assert_eq!(ProcessLastError.last_message(), None);
    }

    #[test]
    fn unhandled_messages_are_recorded() {
        let _guard = lock();
        remove_handler(GLOBAL_HANDLER);
        MIN_MESSAGE_SEVERITY.store(10, Ordering::Relaxed);
        let recorded = "Sybase:  Server message:  Invalid column name 'x'. \
                        (severity 16, procedure sp_report)";

        ProcessLastError.clear();
        assert_eq!(deliver(OTHER_PROC, 5, "Changed database context to 'pubs2'."), 0);
        assert_eq!(ProcessLastError.last_message(), None);

        deliver(OTHER_PROC, 16, "Invalid column name 'x'.");
        assert_eq!(ProcessLastError.last_message().as_deref(), Some(recorded));

        set_handler(GLOBAL_HANDLER, MessageHandler::new(|message| message.severity < 11));
        ProcessLastError.clear();
        deliver(OTHER_PROC, 10, "Changed language setting to us_english.");
        assert_eq!(ProcessLastError.last_message(), None);
        deliver(OTHER_PROC, 16, "Invalid column name 'x'.");
        assert_eq!(ProcessLastError.last_message().as_deref(), Some(recorded));

        set_handler(GLOBAL_HANDLER, MessageHandler::new(|_| panic!("handler failed")));
        ProcessLastError.clear();
        deliver(OTHER_PROC, 16, "Invalid column name 'x'.");
        remove_handler(GLOBAL_HANDLER);
        assert_eq!(ProcessLastError.last_message().as_deref(), Some(recorded));
    }

    #[test]
    fn client_errors_respect_their_floor() {
        let _guard = lock();
        MIN_ERROR_SEVERITY.store(10, Ordering::Relaxed);
        let text = CString::new("Unable to connect: Adaptive Server is unavailable").unwrap();
        let raise = |severity| unsafe {
            error_callback(
                std::ptr::null_mut(),
                severity,
                20009,
                0,
                text.as_ptr() as *mut c_char,
                std::ptr::null_mut(),
            )
        };

        ProcessLastError.clear();
        assert_eq!(raise(2), INT_CANCEL);
        assert_eq!(ProcessLastError.last_message(), None);
        raise(10);
        assert_eq!(
            ProcessLastError.last_message().as_deref(),
            Some(
                "Sybase:  Client message:  Unable to connect: Adaptive Server is unavailable \
                 (severity 10)"
            )
        );
    }

    fn scripted(statuses: &[(RETCODE, c_int)]) -> (OpResult<bool>, usize, usize) {
        let mut script: VecDeque<_> = statuses.iter().copied().collect();
        let mut advanced = 0;
        let mut discarded = 0;
        let found = skip_to_columns(
            || {
                advanced += 1;
                script.pop_front().unwrap_or((NO_MORE_RESULTS, 0))
            },
            || discarded += 1,
        );
        (found, advanced, discarded)
    }

    #[test]
    fn batches_skip_results_without_columns() {
        // set nocount on; select ...
        let (found, advanced, discarded) = scripted(&[(SUCCEED, 0), (SUCCEED, 3)]);
        assert!(matches!(found, Ok(true)));
        assert_eq!((advanced, discarded), (2, 1));

        // update ...; update ...
        let (found, _, discarded) = scripted(&[(SUCCEED, 0), (SUCCEED, 0), (NO_MORE_RESULTS, 0)]);
        assert!(matches!(found, Ok(false)));
        assert_eq!(discarded, 2);

        let (found, advanced, _) = scripted(&[(SUCCEED, 0), (FAIL, 0), (SUCCEED, 2)]);
        assert!(matches!(found, Err(Failure::Recorded)));
        assert_eq!(advanced, 2);
    }
}
