//! Embedded static HTML for the config page.

pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>WiFi Configuration</title>
  <style>
    body { font-family: Arial, sans-serif; background: #1a1a1a; color: #fff; margin: 0; padding: 20px; }
    .container { max-width: 800px; margin: 0 auto; }
    h1 { color: #4CAF50; }
    .section { background: #2a2a2a; padding: 20px; margin: 20px 0; border-radius: 8px; border-left: 4px solid #4CAF50; }
    .form-group { margin: 15px 0; }
    label { display: block; margin-bottom: 5px; font-weight: bold; }
    input { width: 100%; padding: 10px; margin-bottom: 10px; background: #1a1a1a; border: 1px solid #4CAF50; color: #fff; border-radius: 4px; box-sizing: border-box; }
    button { padding: 10px 20px; background: #4CAF50; color: white; border: none; border-radius: 4px; cursor: pointer; font-weight: bold; margin: 5px 5px 5px 0; }
    button:hover { background: #45a049; }
    button.danger { background: #f44336; }
    button.danger:hover { background: #da190b; }
    .profile-item { background: #2a2a2a; padding: 15px; margin: 10px 0; border-left: 3px solid #4CAF50; border-radius: 4px; }
    .profile-item.active { border-left-color: #ffc107; }
    .profile-info { font-size: 0.9em; color: #aaa; }
    small { display: block; color: #999; margin-top: 5px; }
    .tabs { display: flex; gap: 10px; margin-bottom: 20px; }
    .tab-button { padding: 10px 20px; background: #2a2a2a; border: 2px solid #4CAF50; color: #fff; cursor: pointer; border-radius: 4px; }
    .tab-button.active { background: #4CAF50; }
    .tab-content { display: none; }
    .tab-content.active { display: block; }
  </style>
</head>
<body>
  <div class="container">
    <h1>WiFi Configuration</h1>

    <div class="tabs">
      <button class="tab-button active" onclick="switchTab(event, 'profiles')">Saved Profiles</button>
      <button class="tab-button" onclick="switchTab(event, 'add')">Add New WiFi</button>
    </div>

    <div id="profiles" class="tab-content active">
      <div class="section">
        <h2>Saved WiFi Profiles</h2>
        <div id="profileList">Loading profiles...</div>
      </div>
    </div>

    <div id="add" class="tab-content">
      <div class="section">
        <h2>Add New WiFi Profile</h2>
        <form onsubmit="addProfile(event)">
          <div class="form-group">
            <label>WiFi SSID</label>
            <input type="text" id="ssid" placeholder="Network name" required>
          </div>

          <div class="form-group">
            <label>Password</label>
            <input type="password" id="password" placeholder="WiFi password">
            <small>Leave empty for open networks</small>
          </div>

          <div class="form-group">
            <label>Priority (0-255)</label>
            <input type="number" id="priority" min="0" max="255" value="100" required>
            <small>Higher value = higher priority</small>
          </div>

          <div class="form-group">
            <label>Static IP Address</label>
            <input type="text" id="ip" value="192.168.4.1" required>
            <small>Leave 192.168.4.1 to use DHCP</small>
          </div>

          <div class="form-group">
            <label>Gateway</label>
            <input type="text" id="gateway" value="192.168.4.1" required>
          </div>

          <div class="form-group">
            <label>Subnet Mask</label>
            <input type="text" id="subnet" value="255.255.255.0" required>
          </div>

          <div class="form-group">
            <label>Port</label>
            <input type="number" id="port" min="1" max="65535" value="8888" required>
            <small>TCP server port for commands</small>
          </div>

          <button type="submit">Add Profile</button>
        </form>
      </div>
    </div>
  </div>

  <script>
    function switchTab(event, tabName) {
      document.querySelectorAll('.tab-content').forEach(c => c.classList.remove('active'));
      document.querySelectorAll('.tab-button').forEach(b => b.classList.remove('active'));
      document.getElementById(tabName).classList.add('active');
      event.target.classList.add('active');
    }

    function post(params) {
      return fetch('/', {
        method: 'POST',
        headers: { 'Content-Type': 'application/x-www-form-urlencoded' },
        body: new URLSearchParams(params)
      }).then(resp => resp.text());
    }

    async function loadProfiles() {
      const list = document.getElementById('profileList');
      try {
        const resp = await fetch('/api/profiles');
        const data = await resp.json();

        if (!data.profiles.length) {
          list.textContent = 'No saved profiles yet.';
          return;
        }

        list.innerHTML = '';
        data.profiles.forEach((p, i) => {
          const item = document.createElement('div');
          item.className = 'profile-item' + (i === data.active ? ' active' : '');

          const addr = p.dhcp ? 'DHCP' : p.ip + ' / ' + p.subnet + ' gw ' + p.gateway;
          item.innerHTML =
            '<strong>' + p.ssid.replace(/</g, '&lt;') + '</strong>' +
            (i === data.active ? ' (active)' : '') +
            '<div class="profile-info">Priority ' + p.priority +
            ' | ' + addr + ' | port ' + p.port + '</div>';

          const switchBtn = document.createElement('button');
          switchBtn.textContent = 'Switch';
          switchBtn.onclick = () => {
            post({ action: 'switch', index: i }).then(msg => {
              alert(msg);
              loadProfiles();
            });
          };

          const prioBtn = document.createElement('button');
          prioBtn.textContent = 'Set Priority';
          prioBtn.onclick = () => {
            const priority = prompt('Enter new priority (0-255):', p.priority);
            if (priority !== null) {
              post({ action: 'priority', index: i, priority: priority }).then(msg => {
                alert(msg);
                loadProfiles();
              });
            }
          };

          const delBtn = document.createElement('button');
          delBtn.textContent = 'Delete';
          delBtn.className = 'danger';
          delBtn.onclick = () => {
            if (confirm('Delete this profile?')) {
              post({ action: 'delete', index: i }).then(msg => {
                alert(msg);
                loadProfiles();
              });
            }
          };

          item.append(switchBtn, prioBtn, delBtn);
          list.appendChild(item);
        });
      } catch (e) {
        list.textContent = 'Failed to load profiles: ' + e;
      }
    }

    function addProfile(event) {
      event.preventDefault();
      post({
        action: 'add',
        ssid: document.getElementById('ssid').value,
        password: document.getElementById('password').value,
        priority: document.getElementById('priority').value,
        ip: document.getElementById('ip').value,
        gateway: document.getElementById('gateway').value,
        subnet: document.getElementById('subnet').value,
        port: document.getElementById('port').value
      }).then(msg => {
        alert(msg);
        loadProfiles();
      }).catch(err => alert('Error: ' + err));
    }

    loadProfiles();
  </script>
</body>
</html>"#;
