use super::sendmail::send_email;

pub async fn send_withdrawal_processed_email(
    to_email: &str,
    name: &str,
    amount_naira: f64,
    currency: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let subject = "Withdrawal Processed";
    let html_body = format!(
        "<p>Hi {name},</p>\
         <p>Your withdrawal of <strong>{currency} {amount_naira:.2}</strong> has been \
         processed and sent to your bank account.</p>\
         <p>— The Connecta team</p>"
    );

    send_email(to_email, subject, &html_body).await
}

pub async fn send_payment_received_email(
    to_email: &str,
    name: &str,
    amount_naira: f64,
    currency: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let subject = "Payment Released to Your Wallet";
    let html_body = format!(
        "<p>Hi {name},</p>\
         <p><strong>{currency} {amount_naira:.2}</strong> has been released from escrow \
         and is now available in your Connecta wallet.</p>\
         <p>— The Connecta team</p>"
    );

    send_email(to_email, subject, &html_body).await
}
