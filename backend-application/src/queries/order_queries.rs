// Order lookups

use backend_domain::{OrderDetails, OrderId};

use crate::{AppError, AppState};

/// Full view of one order: the order itself, every payment attempt and
/// every ticket row, terminal ones included.
pub async fn get_order(state: &AppState, id: OrderId) -> Result<OrderDetails, AppError> {
    let Some(order) = state.order_repo.find_order(id).await? else {
        return Err(AppError::NotFound(format!("order {}", id)));
    };
    let payments = state.payment_repo.list_payments_for_order(id).await?;
    let tickets = state.ticket_repo.list_tickets_for_order(id).await?;
    Ok(OrderDetails {
        order,
        payments,
        tickets,
    })
}
