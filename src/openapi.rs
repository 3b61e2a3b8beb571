use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::order::{OrderLocale, OrderStatus};
use crate::entities::payment_session::SessionStatus;
use crate::errors::ErrorResponse;
use crate::services::orders::{
    CreateOrderLine, CreateOrderRequest, OrderLineResponse, OrderResponse,
    UpdateOrderStatusRequest,
};
use crate::services::resolver::Decision;
use crate::services::sessions::{OpenSessionRequest, OpenSessionResponse, SessionView};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::update_order_status,
        crate::handlers::payments::start_session,
        crate::handlers::payments::get_session,
        crate::handlers::payments::decide,
        crate::handlers::health::health,
    ),
    components(schemas(
        CreateOrderRequest,
        CreateOrderLine,
        UpdateOrderStatusRequest,
        OrderResponse,
        OrderLineResponse,
        OrderStatus,
        OrderLocale,
        OpenSessionRequest,
        OpenSessionResponse,
        SessionView,
        SessionStatus,
        crate::handlers::payments::DecideRequest,
        Decision,
        ErrorResponse,
    )),
    tags(
        (name = "Orders", description = "Order creation and administration"),
        (name = "Mock payments", description = "Mock payment gateway: sessions and decisions"),
        (name = "Health", description = "Service health")
    ),
    info(
        title = "storefront-api",
        description = "Storefront backend with atomic order-payment reconciliation"
    )
)]
pub struct ApiDoc;

/// Swagger UI mounted at `/docs`, serving the generated document.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
