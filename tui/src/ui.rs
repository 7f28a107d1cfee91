mod layout;
mod widgets;

pub use layout::render;
pub use widgets::{
    html_to_text,
    render_context_menu,
    render_delete_confirmation,
    render_editor,
    render_header,
    render_status_bar,
    render_tree,
};
