//! Mailbox name -> provider label id resolution

use crate::mail::{Label, MailActions, MailError, MailResult, NewLabel};

fn find_by_name<'a>(labels: &'a [Label], name: &str) -> Option<&'a Label> {
    let wanted = name.to_lowercase();
    labels.iter().find(|label| label.name.to_lowercase() == wanted)
}

/// Look up a label by name (case-insensitive), creating it when missing.
///
/// Always asks the provider; nothing is cached between calls. When creation
/// conflicts with a label made concurrently, the list is read once more.
pub async fn resolve_or_create<M>(mail: &M, name: &str) -> MailResult<String>
where
    M: MailActions + ?Sized,
{
    let labels = mail.list_labels().await?;
    if let Some(label) = find_by_name(&labels, name) {
        return Ok(label.id.clone());
    }

    log::info!("Creating label '{}'", name);

    match mail.create_label(&NewLabel::visible(name)).await {
        Ok(label) => Ok(label.id),
        Err(MailError::Conflict(reason)) => {
            log::warn!("Label '{}' appeared while creating it: {}", name, reason);
            let labels = mail.list_labels().await?;
            find_by_name(&labels, name)
                .map(|label| label.id.clone())
                .ok_or(MailError::Conflict(reason))
        }
        Err(e) => Err(e),
    }
}
