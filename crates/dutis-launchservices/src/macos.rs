use std::path::PathBuf;
use std::ptr;

use core_foundation::array::{CFArray, CFArrayRef};
use core_foundation::base::TCFType;
use core_foundation::error::{CFError, CFErrorRef};
use core_foundation::string::{CFString, CFStringRef};
use core_foundation::url::CFURL;
use dutis_core::registry::LS_APPLICATION_NOT_FOUND_ERR;
use dutis_core::{ConcreteRole, RankedHandler, Registry, RegistryError, TagClass, TypeIdentifier};
use log::trace;

#[link(name = "CoreServices", kind = "framework")]
extern "C" {
    fn LSCopyAllRoleHandlersForContentType(content_type: CFStringRef, role: u32) -> CFArrayRef;
    fn LSCopyDefaultRoleHandlerForContentType(content_type: CFStringRef, role: u32) -> CFStringRef;
    fn LSSetDefaultRoleHandlerForContentType(content_type: CFStringRef, role: u32, handler: CFStringRef) -> i32;

    fn LSCopyAllHandlersForURLScheme(scheme: CFStringRef) -> CFArrayRef;
    fn LSCopyDefaultHandlerForURLScheme(scheme: CFStringRef) -> CFStringRef;
    fn LSSetDefaultHandlerForURLScheme(scheme: CFStringRef, handler: CFStringRef) -> i32;

    fn LSCopyApplicationURLsForBundleIdentifier(bundle_identifier: CFStringRef, error: *mut CFErrorRef) -> CFArrayRef;

    fn UTTypeCreatePreferredIdentifierForTag(
        tag_class: CFStringRef,
        tag: CFStringRef,
        conforming_to: CFStringRef,
    ) -> CFStringRef;
}

/// Launch Services as a [`Registry`].
///
/// URL schemes have a single handler slot; the role is ignored for them.
#[derive(Debug, Default)]
pub struct LaunchServices;

impl LaunchServices {
    pub fn new() -> Self {
        LaunchServices
    }
}

fn check(status: i32) -> Result<(), RegistryError> {
    match RegistryError::from_status(status) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Take ownership of a copied string, `None` when the call returned NULL.
unsafe fn owned_string(value: CFStringRef) -> Option<String> {
    if value.is_null() {
        return None;
    }
    Some(CFString::wrap_under_create_rule(value).to_string())
}

/// Take ownership of a copied array of strings; NULL reads as empty.
unsafe fn owned_strings(value: CFArrayRef) -> Vec<String> {
    if value.is_null() {
        return Vec::new();
    }
    let array = CFArray::<CFString>::wrap_under_create_rule(value);
    array.iter().map(|s| s.to_string()).collect()
}

impl Registry for LaunchServices {
    fn query_handlers(
        &self,
        type_identifier: &TypeIdentifier,
        role: ConcreteRole,
    ) -> Result<Vec<RankedHandler>, RegistryError> {
        let key = CFString::new(type_identifier.as_str());
        let handlers = unsafe {
            match type_identifier {
                TypeIdentifier::UrlScheme(_) => owned_strings(LSCopyAllHandlersForURLScheme(key.as_concrete_TypeRef())),
                TypeIdentifier::ContentType(_) => {
                    owned_strings(LSCopyAllRoleHandlersForContentType(key.as_concrete_TypeRef(), role.mask()))
                }
            }
        };
        trace!("event=ls_query type={type_identifier} role={role} count={}", handlers.len());
        Ok(handlers
            .into_iter()
            .enumerate()
            .map(|(rank, application_identifier)| RankedHandler {
                application_identifier,
                rank: rank as u32,
            })
            .collect())
    }

    fn default_handler(
        &self,
        type_identifier: &TypeIdentifier,
        role: ConcreteRole,
    ) -> Result<Option<String>, RegistryError> {
        let key = CFString::new(type_identifier.as_str());
        let handler = unsafe {
            match type_identifier {
                TypeIdentifier::UrlScheme(_) => owned_string(LSCopyDefaultHandlerForURLScheme(key.as_concrete_TypeRef())),
                TypeIdentifier::ContentType(_) => {
                    owned_string(LSCopyDefaultRoleHandlerForContentType(key.as_concrete_TypeRef(), role.mask()))
                }
            }
        };
        Ok(handler)
    }

    fn set_handler(
        &self,
        type_identifier: &TypeIdentifier,
        role: ConcreteRole,
        application_identifier: &str,
    ) -> Result<(), RegistryError> {
        let key = CFString::new(type_identifier.as_str());
        let handler = CFString::new(application_identifier);
        let status = unsafe {
            match type_identifier {
                TypeIdentifier::UrlScheme(_) => {
                    LSSetDefaultHandlerForURLScheme(key.as_concrete_TypeRef(), handler.as_concrete_TypeRef())
                }
                TypeIdentifier::ContentType(_) => LSSetDefaultRoleHandlerForContentType(
                    key.as_concrete_TypeRef(),
                    role.mask(),
                    handler.as_concrete_TypeRef(),
                ),
            }
        };
        trace!("event=ls_set type={type_identifier} role={role} app={application_identifier} status={status}");
        check(status)
    }

    fn locate_bundle(&self, application_identifier: &str) -> Result<Vec<PathBuf>, RegistryError> {
        let identifier = CFString::new(application_identifier);
        let mut error: CFErrorRef = ptr::null_mut();
        let urls = unsafe { LSCopyApplicationURLsForBundleIdentifier(identifier.as_concrete_TypeRef(), &mut error) };

        if urls.is_null() {
            if error.is_null() {
                return Ok(Vec::new());
            }
            let error = unsafe { CFError::wrap_under_create_rule(error) };
            let status = i32::try_from(error.code()).unwrap_or(i32::MIN);
            if status == LS_APPLICATION_NOT_FOUND_ERR {
                return Ok(Vec::new());
            }
            return match RegistryError::from_status(status) {
                Some(err) => Err(err),
                None => Ok(Vec::new()),
            };
        }

        let urls = unsafe { CFArray::<CFURL>::wrap_under_create_rule(urls) };
        Ok(urls.iter().filter_map(|url| url.to_path()).collect())
    }

    fn preferred_identifier(&self, class: TagClass, tag: &str) -> Result<Option<String>, RegistryError> {
        let tag_class = CFString::new(class.as_str());
        let tag = CFString::new(tag);
        let uti = unsafe {
            owned_string(UTTypeCreatePreferredIdentifierForTag(
                tag_class.as_concrete_TypeRef(),
                tag.as_concrete_TypeRef(),
                ptr::null(),
            ))
        };
        Ok(uti)
    }
}
