use crate::error::{PortalError, PortalResult};
use crate::role::{Capability, Principal, VillageScope};
use crate::session::{forget_identity, load_principal, read_identity};
use actix_session::Session;
use actix_web::dev::{
    self, Extensions, Payload, Service, ServiceRequest, ServiceResponse, Transform,
};
use actix_web::{web::Data, Error, FromRequest, HttpMessage, HttpRequest};
use futures::future::{ready, LocalBoxFuture, Ready};
use sea_orm::DatabaseConnection;
use std::rc::Rc;

/// Client data stored for a single request cycle.
/// Distinct from ClientCtx because it is defined through request data.
#[derive(Clone, Debug)]
pub struct ClientCtxInner {
    /// Re-validated caller. None is a guest.
    pub principal: Option<Principal>,
    /// CSRF token for state-changing requests
    pub csrf_token: String,
}

impl Default for ClientCtxInner {
    fn default() -> Self {
        Self {
            principal: None,
            csrf_token: String::new(), // Will be populated from session
        }
    }
}

impl ClientCtxInner {
    pub async fn from_session(session: &Session, db: &DatabaseConnection) -> Self {
        use crate::middleware::csrf::get_or_create_csrf_token;

        let principal = match read_identity(session) {
            Some(identity) => match load_principal(db, identity).await {
                Ok(Some(principal)) => Some(principal),
                Ok(None) => {
                    // Deactivated, deleted or moved out of its village.
                    log::info!("Session identity {:?} no longer grants access", identity);
                    forget_identity(session);
                    None
                }
                Err(e) => {
                    log::error!("Failed to load session principal: {}", e);
                    None
                }
            },
            None => None,
        };

        let csrf_token = get_or_create_csrf_token(session).unwrap_or_else(|_| String::new());

        ClientCtxInner {
            principal,
            csrf_token,
        }
    }
}

/// Client context passed to routes.
/// Wraps ClientCtxInner, which is set at the beginning of the request.
#[derive(Clone, Debug)]
pub struct ClientCtx(Data<ClientCtxInner>);

impl Default for ClientCtx {
    fn default() -> Self {
        Self(Data::new(ClientCtxInner::default()))
    }
}

impl ClientCtx {
    pub fn get_or_default_from_extensions(extensions: &mut Extensions) -> Self {
        match extensions.get::<Data<ClientCtxInner>>() {
            // Existing record in extensions; pull it and return clone.
            Some(cbox) => Self(cbox.clone()),
            // No existing record; create and insert it.
            None => {
                let cbox = Data::new(ClientCtxInner::default());
                extensions.insert(cbox.clone());
                Self(cbox)
            }
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.0.principal.as_ref()
    }

    pub fn is_user(&self) -> bool {
        self.0.principal.is_some()
    }

    pub fn get_csrf_token(&self) -> &str {
        &self.0.csrf_token
    }

    /// Require a logged in caller. Returns the principal or Unauthorized.
    pub fn require_login(&self) -> PortalResult<&Principal> {
        self.principal().ok_or(PortalError::Unauthorized)
    }

    /// Require a capability. Unauthorized for guests, Forbidden otherwise.
    pub fn require(&self, cap: Capability) -> PortalResult<&Principal> {
        self.require_login()?.require(cap)
    }

    /// Village the caller acts on for `cap`.
    pub fn village_scope(&self, cap: Capability) -> PortalResult<VillageScope> {
        self.require_login()?.village_scope(cap)
    }

    /// Citizen id of a logged in citizen.
    pub fn citizen_id(&self) -> PortalResult<i32> {
        self.require(Capability::SubmitLetters)?.citizen_id()
    }
}

/// This implementation is what actually provides the `client: ClientCtx` in the parameters of route functions.
impl FromRequest for ClientCtx {
    /// The associated error which can be returned.
    type Error = Error;
    /// Future that resolves to a Self.
    type Future = Ready<Result<Self, Self::Error>>;

    /// Create a Self from request parts asynchronously.
    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(ClientCtx::get_or_default_from_extensions(
            &mut req.extensions_mut(),
        )))
    }
}

impl<S: 'static, B> Transform<S, ServiceRequest> for ClientCtx
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = ClientCtxMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ClientCtxMiddleware {
            service: Rc::new(service),
        }))
    }
}

/// Client context middleware
pub struct ClientCtxMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for ClientCtxMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();

        // Borrows of `req` must be done in a precise way to avoid conflicts. This order is important.
        let (httpreq, payload) = req.into_parts();
        let session = Session::extract(&httpreq).into_inner();
        let req = ServiceRequest::from_parts(httpreq, payload);

        // Without a database there is no principal to load; handlers see a guest.
        Box::pin(async move {
            if let Some(db) = req.app_data::<Data<DatabaseConnection>>() {
                let db = db.clone();

                match session {
                    Ok(session) => req.extensions_mut().insert(Data::new(
                        ClientCtxInner::from_session(&session, &db).await,
                    )),
                    Err(err) => {
                        log::error!("Unable to extract Session data in middleware: {}", err);
                        None
                    }
                };
            };

            svc.call(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Role;

    fn ctx(principal: Option<Principal>) -> ClientCtx {
        ClientCtx(Data::new(ClientCtxInner {
            principal,
            ..Default::default()
        }))
    }

    #[test]
    fn guests_are_unauthorized() {
        let guest = ClientCtx::default();
        assert!(!guest.is_user());
        assert!(matches!(
            guest.require(Capability::ViewDashboard),
            Err(PortalError::Unauthorized)
        ));
        assert!(matches!(
            guest.village_scope(Capability::ManageCitizens),
            Err(PortalError::Unauthorized)
        ));
    }

    #[test]
    fn staff_without_capability_are_forbidden() {
        let staff = ctx(Some(Principal::Staff {
            user_id: 4,
            username: "perangkat".to_string(),
            full_name: "Perangkat Desa".to_string(),
            role: Role::VillageStaff,
            village_id: Some(2),
        }));
        assert!(matches!(
            staff.require(Capability::ManageWebsite),
            Err(PortalError::Forbidden)
        ));
        assert_eq!(
            staff.village_scope(Capability::ManageCitizens).unwrap(),
            VillageScope {
                actor_id: 4,
                village_id: 2
            }
        );
        assert!(matches!(staff.citizen_id(), Err(PortalError::Forbidden)));
    }
}
