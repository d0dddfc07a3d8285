use std::{
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Result};
use jni::{
    objects::{JObject, JString, JValueGen},
    sys::{JNIInvokeInterface_, _jobject, jint},
    JavaVM,
};
use log::{error, info, warn};
use slint::android::AndroidApp;

use super::{
    orientation::{DeviceOrientation, OrientationSource},
    permission::{AccessCallback, PermissionGate, PermissionState, PromptProgress, PromptWatch},
};

const CAMERA_PERMISSION: &str = "android.permission.CAMERA";
const CAMERA_REQUEST_CODE: i32 = 100;

/// Runtime permission check backed by `Activity.checkSelfPermission`.
///
/// NativeActivity never hears about `onRequestPermissionsResult`, so a pending
/// prompt is polled, together with window focus, until it is answered.
pub struct AndroidPermissionGate {
    app: AndroidApp,
    poll_interval: Duration,
    prompt_grace: Duration,
    timeout: Duration,
}

impl AndroidPermissionGate {
    pub fn new(app: AndroidApp, poll_interval: Duration, prompt_grace: Duration, timeout: Duration) -> Self {
        Self {
            app,
            poll_interval,
            prompt_grace,
            timeout,
        }
    }
}

impl PermissionGate for AndroidPermissionGate {
    fn authorization_status(&self) -> PermissionState {
        match check_self_permission(&self.app, CAMERA_PERMISSION) {
            Ok(true) => PermissionState::Authorized,
            // Android does not tell "never asked" apart from "refused before";
            // asking again is harmless, the system answers at once if blocked.
            Ok(false) => PermissionState::NotDetermined,
            Err(err) => {
                error!("checkSelfPermission failed: {err:?}");
                PermissionState::Denied
            }
        }
    }

    fn request_access(&self, on_result: AccessCallback) {
        if let Err(err) = request_camera_permission(&self.app) {
            error!("requestPermissions failed: {err:?}");
            on_result(false);
            return;
        }
        let app = self.app.clone();
        let poll_interval = self.poll_interval;
        let mut watch = PromptWatch::new(self.prompt_grace, self.timeout);
        let spawned = thread::Builder::new()
            .name("permission-poll".to_string())
            .spawn(move || {
                let started = Instant::now();
                loop {
                    let observed = check_self_permission(&app, CAMERA_PERMISSION)
                        .and_then(|granted| Ok((granted, has_window_focus(&app)?)));
                    let (granted, has_focus) = match observed {
                        Ok(observed) => observed,
                        Err(err) => {
                            error!("permission poll failed: {err:?}");
                            return on_result(false);
                        }
                    };
                    match watch.observe(granted, has_focus, started.elapsed()) {
                        PromptProgress::Granted => {
                            info!("camera permission granted");
                            return on_result(true);
                        }
                        PromptProgress::Refused => {
                            warn!("camera permission refused");
                            return on_result(false);
                        }
                        PromptProgress::Pending => thread::sleep(poll_interval),
                    }
                }
            });
        // A failed spawn drops the callback, which the waiter reads as a refusal.
        if let Err(err) = spawned {
            error!("failed to start permission poll: {err}");
        }
    }
}

/// Orientation read from the default display's rotation.
pub struct DisplayOrientation {
    app: AndroidApp,
}

impl DisplayOrientation {
    pub fn new(app: AndroidApp) -> Self {
        Self { app }
    }
}

impl OrientationSource for DisplayOrientation {
    fn current(&self) -> DeviceOrientation {
        match display_rotation(&self.app) {
            Ok(rotation) => DeviceOrientation::from_display_rotation(rotation),
            Err(err) => {
                error!("getRotation failed: {err:?}");
                DeviceOrientation::Unknown
            }
        }
    }
}

pub fn sdk_version(app: &AndroidApp) -> Result<i32> {
    unsafe {
        let vm = JavaVM::from_raw(app.vm_as_ptr() as *mut *const JNIInvokeInterface_)?;
        let mut env = vm.attach_current_thread()?;
        Ok(env
            .get_static_field("android/os/Build$VERSION", "SDK_INT", "I")?
            .i()?)
    }
}

pub fn check_self_permission(app: &AndroidApp, permission: &str) -> Result<bool> {
    unsafe {
        let vm = JavaVM::from_raw(app.vm_as_ptr() as *mut *const JNIInvokeInterface_)?;
        let mut env = vm.attach_current_thread()?;
        let granted_int = env
            .get_static_field(
                "android/content/pm/PackageManager",
                "PERMISSION_GRANTED",
                "I",
            )?
            .i()?;
        let permission_str = env.new_string(permission)?;
        let activity: JObject<'_> = JObject::from_raw(app.activity_as_ptr() as *mut _jobject);
        let result = env
            .call_method(
                activity,
                "checkSelfPermission",
                "(Ljava/lang/String;)I",
                &[JValueGen::Object(&JObject::from(permission_str))],
            )?
            .i()?;
        Ok(result == granted_int)
    }
}

pub fn request_permissions(app: &AndroidApp, permissions: &[&str], request_code: i32) -> Result<()> {
    unsafe {
        let vm = JavaVM::from_raw(app.vm_as_ptr() as *mut *const JNIInvokeInterface_)?;
        let mut env = vm.attach_current_thread()?;
        let activity: JObject<'_> = JObject::from_raw(app.activity_as_ptr() as *mut _jobject);

        let permission_count = permissions.len() as jint;
        let java_permission_array =
            env.new_object_array(permission_count, "java/lang/String", JObject::null())?;
        for (index, permission) in permissions.iter().enumerate() {
            let permission_str = env.new_string(*permission)?;
            env.set_object_array_element(&java_permission_array, index as jint, permission_str)?;
        }

        env.call_method(
            activity,
            "requestPermissions",
            "([Ljava/lang/String;I)V",
            &[
                JValueGen::Object(&JObject::from(java_permission_array)),
                request_code.into(),
            ],
        )?;
    }
    Ok(())
}

/// `Activity.hasWindowFocus()`; false while a system dialog covers the app.
pub fn has_window_focus(app: &AndroidApp) -> Result<bool> {
    unsafe {
        let vm = JavaVM::from_raw(app.vm_as_ptr() as *mut *const JNIInvokeInterface_)?;
        let mut env = vm.attach_current_thread()?;
        let activity: JObject<'_> = JObject::from_raw(app.activity_as_ptr() as *mut _jobject);
        Ok(env.call_method(activity, "hasWindowFocus", "()Z", &[])?.z()?)
    }
}

/// Runtime permissions exist from API 23 on; older releases grant at install.
pub fn request_camera_permission(app: &AndroidApp) -> Result<()> {
    let sdk_version = sdk_version(app)?;
    info!("sdk version:{sdk_version}");
    if sdk_version >= 23 {
        request_permissions(app, &[CAMERA_PERMISSION], CAMERA_REQUEST_CODE)?;
    }
    Ok(())
}

/// `Display.getRotation()`: one of the `Surface.ROTATION_*` constants.
pub fn display_rotation(app: &AndroidApp) -> Result<i32> {
    unsafe {
        let vm = JavaVM::from_raw(app.vm_as_ptr() as *mut *const JNIInvokeInterface_)?;
        let mut env = vm.attach_current_thread()?;
        let activity: JObject<'_> = JObject::from_raw(app.activity_as_ptr() as *mut _jobject);
        let window_manager = env
            .call_method(activity, "getWindowManager", "()Landroid/view/WindowManager;", &[])?
            .l()?;
        let display = env
            .call_method(&window_manager, "getDefaultDisplay", "()Landroid/view/Display;", &[])?
            .l()?;
        Ok(env.call_method(&display, "getRotation", "()I", &[])?.i()?)
    }
}

/// The app's private files directory, where config and settings are kept.
pub fn files_dir(app: &AndroidApp) -> Result<PathBuf> {
    unsafe {
        let vm = JavaVM::from_raw(app.vm_as_ptr() as *mut *const JNIInvokeInterface_)?;
        let mut env = vm.attach_current_thread()?;
        let activity: JObject<'_> = JObject::from_raw(app.activity_as_ptr() as *mut _jobject);

        let file = env.call_method(activity, "getFilesDir", "()Ljava/io/File;", &[])?;

        if let JValueGen::Object(file) = file {
            let path = env.call_method(file, "getAbsolutePath", "()Ljava/lang/String;", &[])?;

            if let JValueGen::Object(path) = path {
                let path: JString = path.into();
                let path: String = env.get_string(&path)?.into();
                Ok(PathBuf::from(path))
            } else {
                Err(anyhow!("object is not a string"))
            }
        } else {
            Err(anyhow!("object is not a file"))
        }
    }
}
