#![allow(non_camel_case_types, non_snake_case)]

use libc::{c_char, c_int};

pub type RETCODE = c_int;
pub type STATUS = c_int;
pub type DBINT = i32;
pub type BYTE = u8;

#[repr(C)]
pub struct LOGINREC {
    _private: [u8; 0],
}

#[repr(C)]
pub struct DBPROCESS {
    _private: [u8; 0],
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct DBDATETIME {
    pub dtdays: DBINT,
    pub dttime: DBINT,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct DBDATETIME4 {
    pub days: u16,
    pub minutes: u16,
}

pub type EHANDLEFUNC = Option<
    unsafe extern "C" fn(
        dbproc: *mut DBPROCESS,
        severity: c_int,
        dberr: c_int,
        oserr: c_int,
        dberrstr: *mut c_char,
        oserrstr: *mut c_char,
    ) -> c_int,
>;

pub type MHANDLEFUNC = Option<
    unsafe extern "C" fn(
        dbproc: *mut DBPROCESS,
        msgno: DBINT,
        msgstate: c_int,
        severity: c_int,
        msgtext: *mut c_char,
        srvname: *mut c_char,
        proc_: *mut c_char,
        line: c_int,
    ) -> c_int,
>;

#[link(name = "sybdb")]
extern "C" {
    pub fn dbinit() -> RETCODE;
    pub fn dblogin() -> *mut LOGINREC;
    pub fn dbloginfree(login: *mut LOGINREC);
    pub fn dbsetlname(login: *mut LOGINREC, value: *const c_char, which: c_int) -> RETCODE;
    pub fn dbsetlogintime(seconds: c_int) -> RETCODE;
    pub fn dbsettime(seconds: c_int) -> RETCODE;
    pub fn tdsdbopen(login: *mut LOGINREC, server: *const c_char, msdblib: c_int)
        -> *mut DBPROCESS;
    pub fn dbclose(dbproc: *mut DBPROCESS);
    pub fn dbuse(dbproc: *mut DBPROCESS, name: *const c_char) -> RETCODE;
    pub fn dbcmd(dbproc: *mut DBPROCESS, cmdstring: *const c_char) -> RETCODE;
    pub fn dbsqlexec(dbproc: *mut DBPROCESS) -> RETCODE;
    pub fn dbresults(dbproc: *mut DBPROCESS) -> RETCODE;
    pub fn dbcanquery(dbproc: *mut DBPROCESS) -> RETCODE;
    pub fn dbcancel(dbproc: *mut DBPROCESS) -> RETCODE;
    pub fn dbnumcols(dbproc: *mut DBPROCESS) -> c_int;
    pub fn dbcolname(dbproc: *mut DBPROCESS, column: c_int) -> *mut c_char;
    pub fn dbcoltype(dbproc: *mut DBPROCESS, column: c_int) -> c_int;
    pub fn dbcollen(dbproc: *mut DBPROCESS, column: c_int) -> DBINT;
    pub fn dbnextrow(dbproc: *mut DBPROCESS) -> STATUS;
    pub fn dbdata(dbproc: *mut DBPROCESS, column: c_int) -> *mut BYTE;
    pub fn dbdatlen(dbproc: *mut DBPROCESS, column: c_int) -> DBINT;
    pub fn dbconvert(
        dbproc: *mut DBPROCESS,
        srctype: c_int,
        src: *const BYTE,
        srclen: DBINT,
        desttype: c_int,
        dest: *mut BYTE,
        destlen: DBINT,
    ) -> DBINT;
    pub fn dberrhandle(handler: EHANDLEFUNC) -> EHANDLEFUNC;
    pub fn dbmsghandle(handler: MHANDLEFUNC) -> MHANDLEFUNC;
}

// DB-Library return codes
pub const FAIL: RETCODE = 0;
pub const SUCCEED: RETCODE = 1;
pub const NO_MORE_RESULTS: RETCODE = 2;

// dbnextrow status
pub const REG_ROW: STATUS = -1;
pub const NO_MORE_ROWS: STATUS = -2;

// Error handler return
pub const INT_CANCEL: c_int = 2;

// dbsetlname selectors
pub const DBSETUSER: c_int = 2;
pub const DBSETPWD: c_int = 3;
pub const DBSETAPP: c_int = 5;
pub const DBSETCHARSET: c_int = 10;

// Server data types
pub const SYBIMAGE: c_int = 34;
pub const SYBTEXT: c_int = 35;
pub const SYBVARBINARY: c_int = 37;
pub const SYBVARCHAR: c_int = 39;
pub const SYBBINARY: c_int = 45;
pub const SYBCHAR: c_int = 47;
pub const SYBINT1: c_int = 48;
pub const SYBBIT: c_int = 50;
pub const SYBINT2: c_int = 52;
pub const SYBINT4: c_int = 56;
pub const SYBDATETIME4: c_int = 58;
pub const SYBREAL: c_int = 59;
pub const SYBDATETIME: c_int = 61;
pub const SYBFLT8: c_int = 62;
pub const SYBINT8: c_int = 127;
