use anyhow::anyhow;

/// Whether a faked driven port should behave as if its backing system is reachable
pub enum Connectivity {
    Connected,
    Disconnected,
}

impl Connectivity {
    /// Return an error if connectivity is in a "disconnected" state
    pub fn blow_up_if_disconnected(&self) -> Result<(), anyhow::Error> {
        match self {
            Self::Connected => Ok(()),
            Self::Disconnected => Err(anyhow!("could not connect to service!")),
        }
    }
}

/// Records the arguments of every call made to a faked function and hands back a preconfigured
/// return value. Used to fake driving ports, whose methods are async and so don't play nicely
/// with the usual mocking crates.
///
/// * [Args] is what gets captured on each call
/// * [Ret] is the type of the function's return value
///
/// # Example
///
/// ```ignore
/// struct MockTodoService {
///     delete_todo_result: FakeImplementation<(i32, i32), Result<(), TodoError>>,
/// }
///
/// impl TodoPort for Mutex<MockTodoService> {
///     async fn delete_todo(&self, caller: Principal, todo_id: i32, ...) -> Result<(), TodoError> {
///         let mut locked_self = self.lock().expect("mock todo service mutex poisoned");
///         locked_self.delete_todo_result.save_arguments((caller.user_id, todo_id));
///
///         locked_self.delete_todo_result.return_value_result()
///     }
/// }
/// ```
pub struct FakeImplementation<Args, Ret> {
    saved_arguments: Vec<Args>,
    return_value: Option<Ret>,
}

impl<Args, Ret> FakeImplementation<Args, Ret> {
    pub fn new() -> FakeImplementation<Args, Ret> {
        FakeImplementation {
            saved_arguments: Vec::new(),
            return_value: None,
        }
    }

    /// Saves arguments from a single invocation of the FakeImplementation
    pub fn save_arguments(&mut self, arguments: Args) {
        self.saved_arguments.push(arguments)
    }

    /// Returns the arguments passed on every call to this FakeImplementation, oldest first
    pub fn calls(&self) -> &[Args] {
        self.saved_arguments.as_slice()
    }
}

impl<Args, Success, Fail> FakeImplementation<Args, Result<Success, Fail>>
where
    Success: Clone,
    Fail: Clone,
{
    /// Set the result handed back on every call
    pub fn set_returned_result(&mut self, return_value: Result<Success, Fail>) {
        self.return_value = Some(return_value)
    }

    /// Retrieve a copy of the configured result. Panics if no result was configured, since
    /// that means the test called something it didn't expect to.
    pub fn return_value_result(&self) -> Result<Success, Fail> {
        match self.return_value {
            Some(Ok(ref ok_result)) => Ok(ok_result.clone()),
            Some(Err(ref err)) => Err(err.clone()),
            None => panic!("Tried to return from a function where the return value wasn't set!"),
        }
    }
}

impl<Args, Success> FakeImplementation<Args, anyhow::Result<Success>>
where
    Success: Clone,
{
    /// Set the result handed back on every call. [anyhow::Error] isn't [Clone], so errors are
    /// stored by message and rebuilt on each call.
    pub fn set_returned_anyhow(&mut self, return_value: anyhow::Result<Success>) {
        match return_value {
            Ok(ok_result) => self.return_value = Some(Ok(ok_result)),
            Err(err) => self.return_value = Some(Err(anyhow!(format!("{}", err)))),
        }
    }

    /// Retrieve a copy of the configured [anyhow::Result]
    pub fn return_value_anyhow(&self) -> anyhow::Result<Success> {
        match self.return_value {
            None => panic!("Tried to return from a function where the value wasn't set!"),
            Some(Ok(ref ok_result)) => Ok(ok_result.clone()),
            Some(Err(ref err)) => Err(anyhow!(format!("{}", err))),
        }
    }
}
