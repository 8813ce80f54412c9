//! Per-type notification copy: title, body, and link for each
//! `notification_type` a workflow can emit.

use wikiflow_core::error::Result;
use wikiflow_core::types::EventPayload;

use crate::template::render;

/// Body used when a notification type has no template of its own.
pub const FALLBACK_BODY: &str = "Você tem uma nova notificação";
/// Link used when a notification type has no template of its own.
pub const FALLBACK_LINK: &str = "/";
const FALLBACK_TITLE: &str = "Nova notificação";

/// Rendered notification copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub link: String,
}

struct Template {
    title: &'static str,
    body: &'static str,
    link: &'static str,
}

fn template_for(notification_type: &str) -> Template {
    match notification_type {
        "comment_on_post" => Template {
            title: "Novo comentário",
            body: "{{actor_name}} comentou em \"{{post_title}}\"",
            link: "/wiki/{{post_slug}}",
        },
        "comment_reply" => Template {
            title: "Nova resposta",
            body: "{{actor_name}} respondeu ao seu comentário em \"{{post_title}}\"",
            link: "/wiki/{{post_slug}}",
        },
        "post_liked" => Template {
            title: "Nova curtida",
            body: "{{actor_name}} curtiu \"{{post_title}}\"",
            link: "/wiki/{{post_slug}}",
        },
        "post_published" => Template {
            title: "Novo post publicado",
            body: "\"{{post_title}}\" foi publicado",
            link: "/wiki/{{post_slug}}",
        },
        "resource_added" => Template {
            title: "Novo recurso",
            body: "\"{{resource_title}}\" foi adicionado à biblioteca",
            link: "/recursos/{{resource_slug}}",
        },
        "new_user_registered" => Template {
            title: "Novo cadastro",
            body: "{{actor_name}} se cadastrou na plataforma",
            link: "/admin/users",
        },
        "contact_form" => Template {
            title: "Nova mensagem de contato",
            body: "{{actor_name}} enviou uma mensagem pelo formulário de contato",
            link: "/admin/contacts",
        },
        "welcome" => Template {
            title: "Bem-vindo!",
            body: "Sua conta foi criada com sucesso",
            link: "/dashboard",
        },
        _ => Template {
            title: FALLBACK_TITLE,
            body: FALLBACK_BODY,
            link: FALLBACK_LINK,
        },
    }
}

/// Render the copy for `notification_type` from the event payload.
pub fn compose(notification_type: &str, payload: &EventPayload) -> Result<NotificationContent> {
    let copy = template_for(notification_type);
    Ok(NotificationContent {
        title: render(copy.title, payload)?,
        body: render(copy.body, payload)?,
        link: render(copy.link, payload)?,
    })
}
