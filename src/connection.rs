use crate::{
    adapter::{invoke, NativeExtension},
    domain::{
        call_spec::{CallSpec, Slot},
        native_value::{LinkId, MessageHandler, NativeFunction, NativeValue, ResultId, Sentinel},
    },
    errors::Result,
    last_error::{LastErrorSource, ProcessLastError},
};

/// Error-checked front end over a Sybase native extension.
///
/// Every method forwards its arguments to the native function of the same
/// name. Optional arguments left as `None` at the end of the list are not
/// passed at all, so the native default applies. A `false` return from the
/// native layer becomes [`SybaseError::NativeCallFailed`](crate::errors::SybaseError)
/// carrying the last recorded native error; any other value is returned as is.
pub struct Sybase<N, E = ProcessLastError> {
    native: N,
    errors: E,
}

impl<N: NativeExtension> Sybase<N> {
    /// Wraps `native`, reading failures from the process-wide error slot.
    pub fn new(native: N) -> Self {
        Sybase::with_error_source(native, ProcessLastError)
    }
}

impl<N: NativeExtension, E: LastErrorSource> Sybase<N, E> {
    pub fn with_error_source(native: N, errors: E) -> Self {
        Sybase { native, errors }
    }

    pub fn native(&self) -> &N {
        &self.native
    }

    pub fn native_mut(&mut self) -> &mut N {
        &mut self.native
    }

    pub fn into_inner(self) -> N {
        self.native
    }

    fn checked<const A: usize>(
        &mut self,
        function: NativeFunction,
        slots: [Slot; A],
    ) -> Result<NativeValue> {
        invoke(
            &mut self.native,
            &self.errors,
            function,
            CallSpec::new(slots),
            &Sentinel::FALSE,
        )
    }

    /// Opens a link. With `new` unset or `false` an open link with the same
    /// credentials may be returned instead.
    pub fn connect(
        &mut self,
        servername: Option<&str>,
        username: Option<&str>,
        password: Option<&str>,
        charset: Option<&str>,
        appname: Option<&str>,
        new: Option<bool>,
    ) -> Result<NativeValue> {
        self.checked(
            NativeFunction::Connect,
            [
                Slot::optional(servername),
                Slot::optional(username),
                Slot::optional(password),
                Slot::optional(charset),
                Slot::optional(appname),
                Slot::optional(new),
            ],
        )
    }

    /// Opens a persistent link, reusing one with the same credentials when
    /// it is already open.
    pub fn pconnect(
        &mut self,
        servername: Option<&str>,
        username: Option<&str>,
        password: Option<&str>,
        charset: Option<&str>,
        appname: Option<&str>,
    ) -> Result<NativeValue> {
        self.checked(
            NativeFunction::PConnect,
            [
                Slot::optional(servername),
                Slot::optional(username),
                Slot::optional(password),
                Slot::optional(charset),
                Slot::optional(appname),
            ],
        )
    }

    /// Closes `link`, or the last opened link. Persistent links stay open.
    pub fn close(&mut self, link: Option<LinkId>) -> Result<()> {
        self.checked(NativeFunction::Close, [Slot::optional(link)])?;
        Ok(())
    }

    /// Sends `query` to the active database of `link`, or of the last opened
    /// link. Returns a result id, or `true` when no columns came back.
    pub fn query(&mut self, query: &str, link: Option<LinkId>) -> Result<NativeValue> {
        self.checked(
            NativeFunction::Query,
            [Slot::required(query), Slot::optional(link)],
        )
    }

    pub fn unbuffered_query(
        &mut self,
        query: &str,
        link: LinkId,
        store_result: Option<bool>,
    ) -> Result<NativeValue> {
        self.checked(
            NativeFunction::UnbufferedQuery,
            [
                Slot::required(query),
                Slot::required(link),
                Slot::optional(store_result),
            ],
        )
    }

    pub fn select_db(&mut self, database_name: &str, link: Option<LinkId>) -> Result<()> {
        self.checked(
            NativeFunction::SelectDb,
            [Slot::required(database_name), Slot::optional(link)],
        )?;
        Ok(())
    }

    /// Moves the row pointer of `result` so the next fetch returns `row_number`.
    pub fn data_seek(&mut self, result: ResultId, row_number: i64) -> Result<()> {
        self.checked(
            NativeFunction::DataSeek,
            [Slot::required(result), Slot::required(row_number)],
        )?;
        Ok(())
    }

    pub fn field_seek(&mut self, result: ResultId, field_offset: i64) -> Result<()> {
        self.checked(
            NativeFunction::FieldSeek,
            [Slot::required(result), Slot::required(field_offset)],
        )?;
        Ok(())
    }

    pub fn free_result(&mut self, result: ResultId) -> Result<()> {
        self.checked(NativeFunction::FreeResult, [Slot::required(result)])?;
        Ok(())
    }

    /// Registers `handler` for server messages on `link`. Without a link it
    /// becomes the global handler, used by every link that has none of its own.
    pub fn set_message_handler(
        &mut self,
        handler: MessageHandler,
        link: Option<LinkId>,
    ) -> Result<()> {
        self.checked(
            NativeFunction::SetMessageHandler,
            [Slot::required(handler), Slot::optional(link)],
        )?;
        Ok(())
    }
}
