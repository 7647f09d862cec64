use leptos::prelude::*;
use templates::{NavLink, Page};

use crate::BackendView;

// Reads the `/query` event stream with fetch, since EventSource cannot POST.
const CHAT_SCRIPT: &str = r#"
let continueId = null;

function addMessage(role, text) {
  const box = document.createElement('div');
  box.className = 'message';
  const label = document.createElement('div');
  label.className = 'role';
  label.textContent = role;
  const body = document.createElement('pre');
  body.textContent = text;
  box.appendChild(label);
  box.appendChild(body);
  document.getElementById('messages').appendChild(box);
  return body;
}

function showError(target, message) {
  const err = document.createElement('div');
  err.className = 'error';
  err.textContent = message;
  target.parentNode.appendChild(err);
}

function handleFrame(frame, answer) {
  const data = frame.split('\n')
    .filter(function (l) { return l.startsWith('data:'); })
    .map(function (l) { return l.slice(5).trim(); })
    .join('\n');
  if (!data) return;
  let event;
  try { event = JSON.parse(data); } catch (e) { return; }
  if (typeof event.response === 'string') answer.textContent += event.response;
  if (event.error) showError(answer, event.error);
  if (event.chat_id !== undefined) answer.parentNode.dataset.chatId = event.chat_id;
}

async function sendQuery() {
  const input = document.getElementById('prompt');
  const query = input.value.trim();
  if (!query) return;
  input.value = '';
  const button = document.getElementById('send');
  button.disabled = true;
  addMessage('You', query);
  const answer = addMessage('Assistant', '');
  const payload = {query: query};
  if (continueId !== null) payload.chat_id = continueId;
  continueId = null;
  document.getElementById('continue-note').classList.add('hidden');
  try {
    const resp = await fetch('/query', {
      method: 'POST',
      headers: {'Content-Type': 'application/json'},
      body: JSON.stringify(payload)
    });
    if (!resp.ok || !resp.body) {
      const data = await resp.json().catch(function () { return {}; });
      showError(answer, data.error || ('Request failed: ' + resp.status));
      return;
    }
    const reader = resp.body.getReader();
    const decoder = new TextDecoder();
    let buffer = '';
    while (true) {
      const chunk = await reader.read();
      if (chunk.done) break;
      buffer += decoder.decode(chunk.value, {stream: true});
      let idx;
      while ((idx = buffer.indexOf('\n\n')) >= 0) {
        handleFrame(buffer.slice(0, idx), answer);
        buffer = buffer.slice(idx + 2);
      }
    }
    if (buffer.trim()) handleFrame(buffer, answer);
  } catch (e) {
    showError(answer, 'Connection lost: ' + e);
  } finally {
    button.disabled = false;
    loadHistory();
  }
}

async function postJson(url, body) {
  const resp = await fetch(url, {
    method: 'POST',
    headers: {'Content-Type': 'application/json'},
    body: JSON.stringify(body || {})
  });
  return resp.json();
}

async function loadChat(id) {
  const chat = await postJson('/get_chat', {chat_id: id});
  const messages = document.getElementById('messages');
  messages.innerHTML = '';
  if (chat.error) {
    addMessage('Error', chat.error);
    return;
  }
  addMessage('You', chat.query);
  if (chat.reasoning) addMessage('Reasoning', chat.reasoning);
  addMessage(chat.model, chat.answer);
  if (chat.continued) return;
  continueId = chat.id;
  document.getElementById('continue-note').classList.remove('hidden');
}

async function deleteChat(id) {
  await postJson('/delete_chat', {chat_id: id});
  loadHistory();
}

async function clearHistory() {
  if (!confirm('Delete all saved chats?')) return;
  await postJson('/clear_history');
  document.getElementById('messages').innerHTML = '';
  loadHistory();
}

function newChat() {
  continueId = null;
  document.getElementById('continue-note').classList.add('hidden');
  document.getElementById('messages').innerHTML = '';
}

async function loadHistory() {
  const resp = await fetch('/chat_history');
  const chats = await resp.json();
  const list = document.getElementById('history');
  list.innerHTML = '';
  chats.forEach(function (c) {
    const item = document.createElement('li');
    const link = document.createElement('a');
    link.href = 'javascript:void(0)';
    link.textContent = c.query.length > 60 ? c.query.slice(0, 60) + '...' : c.query;
    link.onclick = function () { loadChat(c.id); };
    const meta = document.createElement('small');
    meta.textContent = ' ' + c.model + ' ' + c.timestamp.slice(0, 19).replace('T', ' ') + ' ';
    const del = document.createElement('a');
    del.href = 'javascript:void(0)';
    del.textContent = 'delete';
    del.onclick = function () { deleteChat(c.id); };
    item.appendChild(link);
    item.appendChild(meta);
    item.appendChild(del);
    list.appendChild(item);
  });
}

document.getElementById('prompt').addEventListener('keydown', function (e) {
  if (e.key === 'Enter' && !e.shiftKey) {
    e.preventDefault();
    sendQuery();
  }
});
loadHistory();
"#;

pub fn render_chat(model: &str, backend: &BackendView) -> String {
    let content = view! {
        <p>"Model: "<code>{model.to_string()}</code></p>
        <div id="messages"></div>
        <p id="continue-note" class="hidden">"Your next prompt replaces the loaded chat."</p>
        <textarea id="prompt" placeholder="Ask something"></textarea>
        <p>
            <button id="send" onclick="sendQuery()">"Send"</button>
            " "<button onclick="newChat()">"New chat"</button>
        </p>
        <h2>"History"</h2>
        <p><button onclick="clearHistory()">"Clear history"</button></p>
        <ul id="history"></ul>
        <script inner_html=CHAT_SCRIPT></script>
    };

    Page {
        title: format!("Chat Relay - {}", model),
        heading: "Chat".to_string(),
        backend: Some(backend.badge()),
        nav_links: vec![NavLink::new("Change model", "/")],
        content,
    }
    .render()
}
