use std::sync::mpsc;
#[cfg(any(target_os = "macos", target_os = "windows"))]
use std::time::Duration;

use crate::error::PlatformError;
use crate::keys::KeyEvent;

/// Start a background thread with a listen-only CGEventTap that forwards
/// every key down/up to `tx`. Fails when the tap cannot be created, which
/// usually means Accessibility permission is missing.
#[cfg(target_os = "macos")]
pub fn start_key_listener(tx: mpsc::Sender<KeyEvent>) -> Result<(), PlatformError> {
    use std::ffi::c_void;

    use core_foundation::base::TCFType;
    use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop, CFRunLoopSource};

    use super::darwin::key_from_mac;

    // CGEventTap FFI types and functions
    type CGEventTapProxy = *mut c_void;
    type CGEventRef = *mut c_void;
    type CFMachPortRef = *mut c_void;
    type CFRunLoopSourceRef = *mut c_void;
    type CGEventMask = u64;
    type CGEventType = u32;

    type CGEventTapCallBack = unsafe extern "C" fn(
        CGEventTapProxy,
        CGEventType,
        CGEventRef,
        *mut c_void,
    ) -> CGEventRef;

    const K_CG_HID_EVENT_TAP: u32 = 0; // kCGHIDEventTap
    const K_CG_HEAD_INSERT_EVENT_TAP: u32 = 0;
    const K_CG_EVENT_TAP_OPTION_LISTEN_ONLY: u32 = 1;
    const CG_EVENT_KEY_DOWN: u32 = 10;
    const CG_EVENT_KEY_UP: u32 = 11;

    // Event fields
    const K_CG_KEYBOARD_EVENT_KEYCODE: u32 = 9;
    const K_CG_KEYBOARD_EVENT_AUTOREPEAT: u32 = 8;
    const K_CG_EVENT_SOURCE_UNIX_PROCESS_ID: u32 = 41;

    extern "C" {
        fn CGEventTapCreate(
            tap: u32,
            place: u32,
            options: u32,
            events_of_interest: CGEventMask,
            callback: CGEventTapCallBack,
            user_info: *mut c_void,
        ) -> CFMachPortRef;

        fn CFMachPortCreateRunLoopSource(
            allocator: *const c_void,
            port: CFMachPortRef,
            order: i64,
        ) -> CFRunLoopSourceRef;

        fn CGEventGetIntegerValueField(event: CGEventRef, field: u32) -> i64;
        fn CGEventTapEnable(tap: CFMachPortRef, enable: bool);
    }

    struct TapContext {
        tx: mpsc::Sender<KeyEvent>,
        own_pid: i64,
    }

    unsafe extern "C" fn key_callback(
        _proxy: CGEventTapProxy,
        event_type: CGEventType,
        event: CGEventRef,
        user_info: *mut c_void,
    ) -> CGEventRef {
        unsafe {
            if event_type != CG_EVENT_KEY_DOWN && event_type != CG_EVENT_KEY_UP {
                return event;
            }
            if CGEventGetIntegerValueField(event, K_CG_KEYBOARD_EVENT_AUTOREPEAT) != 0 {
                return event;
            }

            let ctx = &*(user_info as *const TapContext);
            let code = CGEventGetIntegerValueField(event, K_CG_KEYBOARD_EVENT_KEYCODE);
            let source_pid = CGEventGetIntegerValueField(event, K_CG_EVENT_SOURCE_UNIX_PROCESS_ID);

            if let Some(key) = key_from_mac(code as u16) {
                ctx.tx
                    .send(KeyEvent {
                        key,
                        pressed: event_type == CG_EVENT_KEY_DOWN,
                        injected: source_pid != 0 && source_pid == ctx.own_pid,
                    })
                    .ok();
            }

            event
        }
    }

    let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), PlatformError>>(1);

    std::thread::spawn(move || {
        unsafe {
            let mask: CGEventMask = (1 << CG_EVENT_KEY_DOWN) | (1 << CG_EVENT_KEY_UP);
            let ctx = Box::new(TapContext { tx, own_pid: libc::getpid() as i64 });
            let ctx_ptr = Box::into_raw(ctx) as *mut c_void;

            let tap = CGEventTapCreate(
                K_CG_HID_EVENT_TAP,
                K_CG_HEAD_INSERT_EVENT_TAP,
                K_CG_EVENT_TAP_OPTION_LISTEN_ONLY,
                mask,
                key_callback,
                ctx_ptr,
            );

            if tap.is_null() {
                // Reclaim the context so we don't leak
                drop(Box::from_raw(ctx_ptr as *mut TapContext));
                ready_tx
                    .send(Err(PlatformError::Listener(
                        "failed to create event tap, grant Accessibility permission to your terminal".into(),
                    )))
                    .ok();
                return;
            }

            let source_ref = CFMachPortCreateRunLoopSource(std::ptr::null(), tap, 0);
            let source = CFRunLoopSource::wrap_under_create_rule(source_ref as _);
            CFRunLoop::get_current().add_source(&source, kCFRunLoopCommonModes);
            CGEventTapEnable(tap, true);
            ready_tx.send(Ok(())).ok();

            CFRunLoop::run_current(); // blocks forever
        }
    });

    ready_rx
        .recv_timeout(Duration::from_secs(2))
        .map_err(|_| PlatformError::Listener("event tap thread did not signal readiness".into()))?
}

#[cfg(target_os = "windows")]
mod win {
    use std::sync::mpsc::Sender;
    use std::sync::Mutex;

    use crate::keys::KeyEvent;
    use crate::platform::win32::key_from_vk;

    pub(super) static KEY_EVENT_SENDER: Mutex<Option<Sender<KeyEvent>>> = Mutex::new(None);

    pub(super) unsafe extern "system" fn keyboard_hook_proc(
        n_code: i32,
        w_param: windows::Win32::Foundation::WPARAM,
        l_param: windows::Win32::Foundation::LPARAM,
    ) -> windows::Win32::Foundation::LRESULT {
        use windows::Win32::UI::WindowsAndMessaging::{
            CallNextHookEx, HC_ACTION, HHOOK, KBDLLHOOKSTRUCT, KBDLLHOOKSTRUCT_FLAGS, WM_KEYDOWN,
            WM_KEYUP, WM_SYSKEYDOWN, WM_SYSKEYUP,
        };

        if n_code == HC_ACTION as i32 {
            let msg = w_param.0 as u32;
            let pressed = msg == WM_KEYDOWN || msg == WM_SYSKEYDOWN;
            let released = msg == WM_KEYUP || msg == WM_SYSKEYUP;
            if pressed || released {
                let info = unsafe { &*(l_param.0 as *const KBDLLHOOKSTRUCT) };
                let injected =
                    (info.flags & KBDLLHOOKSTRUCT_FLAGS(0x10)) != KBDLLHOOKSTRUCT_FLAGS(0);
                if let Some(key) = key_from_vk(info.vkCode) {
                    if let Ok(guard) = KEY_EVENT_SENDER.lock() {
                        if let Some(sender) = guard.as_ref() {
                            let _ = sender.send(KeyEvent { key, pressed, injected });
                        }
                    }
                }
            }
        }

        unsafe { CallNextHookEx(HHOOK(std::ptr::null_mut()), n_code, w_param, l_param) }
    }
}

/// Install a low-level keyboard hook on a dedicated message-loop thread and
/// forward every key transition to `tx`. The hook never swallows input.
#[cfg(target_os = "windows")]
pub fn start_key_listener(tx: mpsc::Sender<KeyEvent>) -> Result<(), PlatformError> {
    use windows::Win32::System::LibraryLoader::GetModuleHandleW;
    use windows::Win32::UI::WindowsAndMessaging::{
        DispatchMessageW, GetMessageW, SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx,
        MSG, WH_KEYBOARD_LL,
    };

    if let Ok(mut guard) = win::KEY_EVENT_SENDER.lock() {
        *guard = Some(tx);
    }

    let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), PlatformError>>(1);

    std::thread::spawn(move || {
        let hmodule = match unsafe { GetModuleHandleW(None) } {
            Ok(h) => h,
            Err(err) => {
                let _ = ready_tx.send(Err(PlatformError::Listener(err.to_string())));
                return;
            }
        };

        let hook = match unsafe {
            SetWindowsHookExW(WH_KEYBOARD_LL, Some(win::keyboard_hook_proc), hmodule, 0)
        } {
            Ok(h) if !h.0.is_null() => h,
            Ok(_) => {
                let _ = ready_tx.send(Err(PlatformError::Listener("SetWindowsHookExW returned null".into())));
                return;
            }
            Err(err) => {
                let _ = ready_tx.send(Err(PlatformError::Listener(err.to_string())));
                return;
            }
        };

        let _ = ready_tx.send(Ok(()));

        let mut msg = MSG::default();
        loop {
            let r = unsafe { GetMessageW(&mut msg, None, 0, 0) };
            if r.0 <= 0 {
                break;
            }
            unsafe {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }

        unsafe {
            let _ = UnhookWindowsHookEx(hook);
        }
    });

    ready_rx
        .recv_timeout(Duration::from_secs(2))
        .map_err(|_| PlatformError::Listener("keyboard hook thread did not signal readiness".into()))?
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub fn start_key_listener(_tx: mpsc::Sender<KeyEvent>) -> Result<(), PlatformError> {
    Err(PlatformError::Unsupported("global key listening"))
}
