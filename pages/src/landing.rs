use common::models::ModelSpec;
use leptos::prelude::*;
use templates::{NavLink, Page};

use crate::BackendView;

const SELECT_SCRIPT: &str = r#"
function setButtons(disabled) {
  document.querySelectorAll('button.select-model').forEach(function (b) { b.disabled = disabled; });
}
async function selectModel(model) {
  const status = document.getElementById('init-status');
  status.textContent = 'Preparing ' + model + '. The first start can take several minutes.';
  setButtons(true);
  try {
    const resp = await fetch('/initialize_model', {
      method: 'POST',
      headers: {'Content-Type': 'application/json'},
      body: JSON.stringify({model: model})
    });
    const data = await resp.json();
    if (data.success) {
      window.location.href = '/chat';
      return;
    }
    status.textContent = data.error || 'Model initialization failed';
  } catch (e) {
    status.textContent = 'Model initialization failed: ' + e;
  }
  setButtons(false);
}
"#;

pub fn render_landing(models: &[ModelSpec], backend: &BackendView) -> String {
    let disabled = !backend.available;
    let rows = models
        .iter()
        .map(|m| {
            let name = m.name.clone();
            view! {
                <tr>
                    <td><code>{m.name.clone()}</code></td>
                    <td>{m.ram.clone()}</td>
                    <td>{m.description.clone()}</td>
                    <td>
                        <button
                            class="select-model"
                            value={name}
                            disabled={disabled}
                            onclick="selectModel(this.value)"
                        >"Use"</button>
                    </td>
                </tr>
            }
        })
        .collect::<Vec<_>>();

    let content = view! {
        <h2>"Models"</h2>
        {if models.is_empty() {
            view! { <p>"No models configured."</p> }.into_any()
        } else {
            view! {
                <table>
                    <tr>
                        <th>"Model"</th>
                        <th>"RAM"</th>
                        <th>"Description"</th>
                        <th></th>
                    </tr>
                    {rows}
                </table>
            }
            .into_any()
        }}
        <p id="init-status"></p>
        <script inner_html=SELECT_SCRIPT></script>
    };

    Page {
        title: "Chat Relay".to_string(),
        heading: "Chat Relay".to_string(),
        backend: Some(backend.badge()),
        nav_links: vec![NavLink::new("Chat", "/chat")],
        content,
    }
    .render()
}
