#[cfg(feature = "tracing")]
use tracing::{debug, error, warn};

use super::{Attachment, HostArg, HostEnv, HostError, HostMethod, HostRuntime, HostValue};

pub const VIBRATE: HostMethod = HostMethod::new("nativeVibrate", "()V");
pub const SHOW_TOAST: HostMethod = HostMethod::new("nativeShowToast", "(Ljava/lang/String;)V");
pub const SHOW_ALERT: HostMethod = HostMethod::new(
    "nativeShowAlert",
    "(Ljava/lang/String;Ljava/lang/String;)V",
);
pub const SHARE: HostMethod = HostMethod::new(
    "nativeShare",
    "(Ljava/lang/String;Ljava/lang/String;)V",
);
pub const OPEN_CAMERA: HostMethod = HostMethod::new("nativeOpenCamera", "()V");
pub const TOGGLE_FLASHLIGHT: HostMethod = HostMethod::new("nativeToggleFlashlight", "()V");
pub const START_BIOMETRIC: HostMethod = HostMethod::new("nativeStartBiometric", "()V");
pub const GET_PUSH_TOKEN: HostMethod = HostMethod::new("nativeGetPushToken", "()V");
pub const SECURE_SET: HostMethod = HostMethod::new(
    "nativeSecureSet",
    "(Ljava/lang/String;Ljava/lang/String;)Z",
);
pub const SECURE_GET: HostMethod = HostMethod::new(
    "nativeSecureGet",
    "(Ljava/lang/String;)Ljava/lang/String;",
);

/// Device capabilities exposed to PHP.
///
/// Each call is fire-and-forget from the script's point of view: failures
/// are logged and turn into a no-op (or `false` / `None` for secure storage).
pub struct NativeActions<R: HostRuntime> {
    runtime: R,
}

impl<R: HostRuntime> NativeActions<R> {
    pub fn new(runtime: R) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn try_call(&self, method: HostMethod, args: &[HostArg<'_>]) -> Result<HostValue, HostError> {
        let mut env = Attachment::acquire(&self.runtime)?;
        env.call(method, args)
    }

    fn call(&self, method: HostMethod, args: &[HostArg<'_>]) -> Option<HostValue> {
        match self.try_call(method, args) {
            Ok(value) => {
                #[cfg(feature = "tracing")]
                debug!(method = method.name, "Host method called");
                Some(value)
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                error!(method = %method, error = %_e, "Host call failed");
                None
            }
        }
    }

    pub fn vibrate(&self) {
        self.call(VIBRATE, &[]);
    }

    pub fn show_toast(&self, message: &str) {
        self.call(SHOW_TOAST, &[HostArg::Str(message)]);
    }

    /// Shows an alert. The host has no way to report the pressed button, so
    /// `on_button` runs right away with index 0.
    pub fn show_alert(&self, title: &str, message: &str, on_button: impl FnOnce(i32)) {
        self.call(SHOW_ALERT, &[HostArg::Str(title), HostArg::Str(message)]);
        on_button(0);
    }

    pub fn share(&self, title: &str, message: &str) {
        self.call(SHARE, &[HostArg::Str(title), HostArg::Str(message)]);
    }

    pub fn open_camera(&self) {
        self.call(OPEN_CAMERA, &[]);
    }

    pub fn toggle_flashlight(&self) {
        self.call(TOGGLE_FLASHLIGHT, &[]);
    }

    pub fn start_biometric(&self) {
        self.call(START_BIOMETRIC, &[]);
    }

    pub fn get_push_token(&self) {
        self.call(GET_PUSH_TOKEN, &[]);
    }

    pub fn secure_set(&self, key: &str, value: &str) -> bool {
        match self.call(SECURE_SET, &[HostArg::Str(key), HostArg::Str(value)]) {
            Some(HostValue::Bool(stored)) => stored,
            Some(_other) => {
                #[cfg(feature = "tracing")]
                warn!(returned = ?_other, "Unexpected return from secure set");
                false
            }
            None => false,
        }
    }

    pub fn secure_get(&self, key: &str) -> Option<String> {
        match self.call(SECURE_GET, &[HostArg::Str(key)])? {
            HostValue::Str(value) => value,
            _other => {
                #[cfg(feature = "tracing")]
                warn!(returned = ?_other, "Unexpected return from secure get");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::rc::Rc;

    #[derive(Default)]
    struct Host {
        calls: RefCell<Vec<String>>,
        store: RefCell<HashMap<String, String>>,
        missing: Vec<&'static str>,
        no_instance: bool,
    }

    struct FakeEnv {
        host: Rc<Host>,
    }

    impl HostEnv for FakeEnv {
        fn call(&mut self, method: HostMethod, args: &[HostArg<'_>]) -> Result<HostValue, HostError> {
            if self.host.no_instance {
                return Err(HostError::NoInstance);
            }
            if self.host.missing.contains(&method.name) {
                return Err(HostError::MethodNotFound {
                    name: method.name,
                    signature: method.signature,
                });
            }

            let strs: Vec<&str> = args
                .iter()
                .map(|a| match a {
                    HostArg::Str(s) => *s,
                })
                .collect();
            self.host
                .calls
                .borrow_mut()
                .push(format!("{}({})", method.name, strs.join(",")));

            Ok(match method {
                SECURE_SET => {
                    self.host
                        .store
                        .borrow_mut()
                        .insert(strs[0].to_string(), strs[1].to_string());
                    HostValue::Bool(true)
                }
                SECURE_GET => HostValue::Str(self.host.store.borrow().get(strs[0]).cloned()),
                _ => HostValue::Void,
            })
        }
    }

    struct FakeRuntime {
        host: Rc<Host>,
        thread_attached: bool,
        attach_fails: bool,
        attaches: Cell<u32>,
        detaches: Cell<u32>,
    }

    impl FakeRuntime {
        fn new(host: Host) -> Self {
            Self {
                host: Rc::new(host),
                thread_attached: true,
                attach_fails: false,
                attaches: Cell::new(0),
                detaches: Cell::new(0),
            }
        }
    }

    impl HostRuntime for FakeRuntime {
        type Env = FakeEnv;

        fn current_env(&self) -> Option<FakeEnv> {
            self.thread_attached.then(|| FakeEnv {
                host: Rc::clone(&self.host),
            })
        }

        fn attach_current_thread(&self) -> Result<FakeEnv, HostError> {
            if self.attach_fails {
                return Err(HostError::AttachFailed);
            }
            self.attaches.set(self.attaches.get() + 1);
            Ok(FakeEnv {
                host: Rc::clone(&self.host),
            })
        }

        fn detach_current_thread(&self) {
            self.detaches.set(self.detaches.get() + 1);
        }
    }

    fn calls(actions: &NativeActions<FakeRuntime>) -> Vec<String> {
        actions.runtime().host.calls.borrow().clone()
    }

    #[test]
    fn test_calls_reach_host() {
        let actions = NativeActions::new(FakeRuntime::new(Host::default()));

        actions.vibrate();
        actions.show_toast("hello");
        actions.share("Title", "Body");
        actions.open_camera();
        actions.toggle_flashlight();
        actions.start_biometric();
        actions.get_push_token();

        assert_eq!(
            calls(&actions),
            vec![
                "nativeVibrate()",
                "nativeShowToast(hello)",
                "nativeShare(Title,Body)",
                "nativeOpenCamera()",
                "nativeToggleFlashlight()",
                "nativeStartBiometric()",
                "nativeGetPushToken()",
            ]
        );
    }

    #[test]
    fn test_alert_fires_callback_with_zero() {
        let actions = NativeActions::new(FakeRuntime::new(Host::default()));
        let mut pressed = None;

        actions.show_alert("Hi", "There", |idx| pressed = Some(idx));

        assert_eq!(pressed, Some(0));
        assert_eq!(calls(&actions), vec!["nativeShowAlert(Hi,There)"]);
    }

    #[test]
    fn test_alert_callback_runs_even_when_host_fails() {
        let host = Host {
            no_instance: true,
            ..Host::default()
        };
        let actions = NativeActions::new(FakeRuntime::new(host));
        let mut pressed = None;

        actions.show_alert("Hi", "There", |idx| pressed = Some(idx));

        assert_eq!(pressed, Some(0));
    }

    #[test]
    fn test_secure_storage() {
        let actions = NativeActions::new(FakeRuntime::new(Host::default()));

        assert_eq!(actions.secure_get("token"), None);
        assert!(actions.secure_set("token", "abc"));
        assert_eq!(actions.secure_get("token").as_deref(), Some("abc"));
    }

    #[test]
    fn test_missing_method_is_noop() {
        let host = Host {
            missing: vec!["nativeVibrate", "nativeSecureSet", "nativeSecureGet"],
            ..Host::default()
        };
        let actions = NativeActions::new(FakeRuntime::new(host));

        actions.vibrate();
        assert!(!actions.secure_set("k", "v"));
        assert_eq!(actions.secure_get("k"), None);
        assert!(calls(&actions).is_empty());

        let err = actions.try_call(VIBRATE, &[]).unwrap_err();
        assert_eq!(err.to_string(), "Host method not found: nativeVibrate()V");
    }

    #[test]
    fn test_attaches_and_detaches_unattached_thread() {
        let mut runtime = FakeRuntime::new(Host::default());
        runtime.thread_attached = false;
        let actions = NativeActions::new(runtime);

        actions.vibrate();
        actions.show_toast("x");

        assert_eq!(actions.runtime().attaches.get(), 2);
        assert_eq!(actions.runtime().detaches.get(), 2);
        assert_eq!(calls(&actions).len(), 2);
    }

    #[test]
    fn test_attached_thread_stays_attached() {
        let actions = NativeActions::new(FakeRuntime::new(Host::default()));

        {
            let guard = Attachment::acquire(actions.runtime()).unwrap();
            assert!(!guard.attached());
        }

        assert_eq!(actions.runtime().attaches.get(), 0);
        assert_eq!(actions.runtime().detaches.get(), 0);
    }

    #[test]
    fn test_attach_failure_is_noop() {
        let mut runtime = FakeRuntime::new(Host::default());
        runtime.thread_attached = false;
        runtime.attach_fails = true;
        let actions = NativeActions::new(runtime);

        actions.vibrate();
        assert!(!actions.secure_set("k", "v"));
        assert_eq!(actions.runtime().detaches.get(), 0);
        assert!(calls(&actions).is_empty());
    }
}
